//! Server side admin sessions keyed by the `session` cookie

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::models::AdminIdentity;

pub const SESSION_COOKIE: &str = "session";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionData {
    pub admin_auth: bool,
    pub admin_user: Option<String>,
    pub tenant_slug: Option<String>,
    pub csrf_token: Option<String>,
}

impl SessionData {
    /// Identity the services act as, only for authenticated sessions
    pub fn identity(&self) -> Option<AdminIdentity> {
        if self.admin_auth {
            Some(AdminIdentity::new(
                self.admin_user.clone().unwrap_or_default(),
                self.tenant_slug.clone().filter(|slug| !slug.is_empty()),
            ))
        } else {
            None
        }
    }
}

pub fn new_csrf_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

#[derive(Clone)]
pub struct SessionStore {
    ttl: Duration,
    entries: Arc<Mutex<HashMap<String, (Instant, SessionData)>>>,
}

impl SessionStore {
    pub fn new(ttl_s: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_s),
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Live session data; touching a session extends its idle expiry
    pub fn load(&self, id: &str) -> Option<SessionData> {
        let mut entries = self.entries.lock().ok()?;
        let now = Instant::now();
        let ttl = self.ttl;
        entries.retain(|_, (touched, _)| now.duration_since(*touched) < ttl);
        entries.get_mut(id).map(|(touched, data)| {
            *touched = now;
            data.clone()
        })
    }

    pub fn save(&self, id: &str, data: SessionData) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(id.to_string(), (Instant::now(), data));
        }
    }

    /// Stores `data` under a fresh id and returns the id
    pub fn create(&self, data: SessionData) -> String {
        let id = Uuid::new_v4().to_string();
        self.save(&id, data);
        id
    }

    pub fn remove(&self, id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(id);
        }
    }
}

/// `Set-Cookie` value carrying the session id
pub fn session_cookie(id: &str, secure: bool) -> String {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that drops the session cookie
pub fn expired_cookie(secure: bool) -> String {
    let mut cookie = format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", SESSION_COOKIE);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_expire_when_idle() {
        let store = SessionStore::new(0);
        let id = store.create(SessionData::default());
        assert!(store.load(&id).is_none());

        let store = SessionStore::new(60);
        let id = store.create(SessionData {
            admin_auth: true,
            admin_user: Some("ana".to_string()),
            ..SessionData::default()
        });
        assert_eq!(store.load(&id).and_then(|s| s.admin_user), Some("ana".to_string()));
        store.remove(&id);
        assert!(store.load(&id).is_none());
    }

    #[test]
    fn only_authenticated_sessions_have_an_identity() {
        assert!(SessionData::default().identity().is_none());
        let data = SessionData {
            admin_auth: true,
            admin_user: Some("ana".to_string()),
            tenant_slug: Some("local1".to_string()),
            csrf_token: None,
        };
        let identity = data.identity().unwrap();
        assert!(identity.can_access("local1"));
        assert!(!identity.can_access("local2"));
    }

    #[test]
    fn cookie_flags() {
        assert_eq!(session_cookie("x", false), "session=x; Path=/; HttpOnly; SameSite=Lax");
        assert!(session_cookie("x", true).ends_with("; Secure"));
        assert!(expired_cookie(false).contains("Max-Age=0"));
    }
}
