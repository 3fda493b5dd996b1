//! Back office accounts and the identity a session carries

use diesel::sql_types::Text;
use diesel::QueryableByName;

#[derive(Clone, Debug, QueryableByName)]
pub struct AdminUser {
    #[diesel(sql_type = Text)]
    pub username: String,
    #[diesel(sql_type = Text)]
    pub password_hash: String,
}

#[derive(Clone, Debug, PartialEq, QueryableByName)]
pub struct Username {
    #[diesel(sql_type = Text)]
    pub username: String,
}

#[derive(Clone, Debug)]
pub struct NewAdminUser {
    pub tenant_slug: String,
    pub username: String,
    pub password_hash: String,
}

/// Who is calling. Dev logins may come without a tenant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminIdentity {
    pub username: String,
    pub tenant_slug: Option<String>,
}

impl AdminIdentity {
    pub fn new(username: String, tenant_slug: Option<String>) -> Self {
        Self {
            username,
            tenant_slug: tenant_slug.filter(|t| !t.is_empty()),
        }
    }

    /// A session bound to one tenant may only act on that tenant
    pub fn can_access(&self, tenant_slug: &str) -> bool {
        self.tenant_slug.as_ref().map(|own| own == tenant_slug).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_identity_reaches_every_tenant() {
        let dev = AdminIdentity::new("admin".to_string(), Some(String::new()));
        assert_eq!(dev.tenant_slug, None);
        assert!(dev.can_access("cualquiera"));

        let bound = AdminIdentity::new("ana".to_string(), Some("local1".to_string()));
        assert!(bound.can_access("local1"));
        assert!(!bound.can_access("local2"));
    }
}
