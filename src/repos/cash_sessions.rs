//! Repo for cash_sessions table

use failure::Error as FailureError;
use failure::Fail;

use crate::db::DbConnection;
use crate::models::authorization::*;
use crate::models::{CashSession, CloseCashSession, NewCashSession, SessionHistoryFilter};
use crate::repos::acl;
use crate::repos::error::{Error, ErrorKind, ErrorSource};
use crate::repos::legacy_acl::*;
use crate::repos::types::RepoResult;

const SESSION_COLUMNS: &str = "id, tenant_slug, opened_at, opened_by, opening_amount, notes_open, closed_at, closed_by, \
     closing_amount, notes_close, closing_diff, closing_metadata";

/// Cash sessions repository
pub trait CashSessionsRepo {
    /// Latest session of the tenant that is still open
    fn get_open(&self, tenant_slug: &str) -> RepoResult<Option<CashSession>>;

    /// Session by id, only when it belongs to the tenant
    fn get(&self, tenant_slug: &str, session_id: i32) -> RepoResult<Option<CashSession>>;

    fn create(&self, payload: NewCashSession) -> RepoResult<CashSession>;

    fn close(&self, session_id: i32, payload: CloseCashSession) -> RepoResult<CashSession>;

    /// Closed sessions, newest close first; `paging` is `(limit, offset)`
    fn list_closed(&self, filter: &SessionHistoryFilter, paging: Option<(i64, i64)>) -> RepoResult<Vec<CashSession>>;
}

pub struct CashSessionsRepoImpl<'a> {
    pub db_conn: &'a DbConnection,
    pub acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>,
}

impl<'a> CashSessionsRepoImpl<'a> {
    pub fn new(db_conn: &'a DbConnection, acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>) -> Self {
        Self { db_conn, acl }
    }

    fn load(&self, session_id: i32) -> RepoResult<CashSession> {
        self.db_conn
            .load_one::<CashSession>(
                &format!("SELECT {} FROM cash_sessions WHERE id = ?", SESSION_COLUMNS),
                &params![session_id],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => session_id)
            })?
            .ok_or_else(|| {
                let e = format_err!("Cash session {} not found", session_id);
                ectx!(err e, ErrorKind::NotFound => session_id)
            })
    }
}

impl<'a> CashSessionsRepo for CashSessionsRepoImpl<'a> {
    fn get_open(&self, tenant_slug: &str) -> RepoResult<Option<CashSession>> {
        debug!("Getting open cash session of {}", tenant_slug);

        acl::check(&*self.acl, Resource::CashSessions, Action::Read, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .load_one::<CashSession>(
                &format!(
                    "SELECT {} FROM cash_sessions WHERE tenant_slug = ? AND closed_at IS NULL ORDER BY opened_at DESC LIMIT 1",
                    SESSION_COLUMNS
                ),
                &params![tenant_slug],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => tenant_slug)
            })
    }

    fn get(&self, tenant_slug: &str, session_id: i32) -> RepoResult<Option<CashSession>> {
        debug!("Getting cash session {} of {}", session_id, tenant_slug);

        acl::check(&*self.acl, Resource::CashSessions, Action::Read, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .load_one::<CashSession>(
                &format!("SELECT {} FROM cash_sessions WHERE id = ? AND tenant_slug = ?", SESSION_COLUMNS),
                &params![session_id, tenant_slug],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => tenant_slug, session_id)
            })
    }

    fn create(&self, payload: NewCashSession) -> RepoResult<CashSession> {
        debug!("Opening a cash session using payload: {:?}", payload);

        acl::check(
            &*self.acl,
            Resource::CashSessions,
            Action::Write,
            self,
            Some(&TenantSlug::new(payload.tenant_slug.clone())),
        )?;

        let id = self
            .db_conn
            .insert(
                "INSERT INTO cash_sessions (tenant_slug, opened_at, opened_by, opening_amount, notes_open) VALUES (?, ?, ?, ?, ?)",
                &params![
                    payload.tenant_slug.clone(),
                    payload.opened_at.clone(),
                    payload.opened_by.clone(),
                    payload.opening_amount,
                    payload.notes_open.clone(),
                ],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => payload)
            })?
            .ok_or_else(|| {
                let e = format_err!("Insert returned no id");
                ectx!(err e, ErrorKind::Internal => payload)
            })?;

        self.load(id)
    }

    fn close(&self, session_id: i32, payload: CloseCashSession) -> RepoResult<CashSession> {
        debug!("Closing cash session {} using payload: {:?}", session_id, payload);

        let session = self.load(session_id)?;
        acl::check(
            &*self.acl,
            Resource::CashSessions,
            Action::Write,
            self,
            Some(&TenantSlug::new(session.tenant_slug)),
        )?;

        self.db_conn
            .execute(
                "UPDATE cash_sessions SET closed_at = ?, closed_by = ?, closing_amount = ?, notes_close = ?, closing_diff = ?, \
                 closing_metadata = ? WHERE id = ?",
                &params![
                    payload.closed_at.clone(),
                    payload.closed_by.clone(),
                    payload.closing_amount,
                    payload.notes_close.clone(),
                    payload.closing_diff,
                    payload.closing_metadata.to_string(),
                    session_id,
                ],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => session_id, payload)
            })?;

        self.load(session_id)
    }

    fn list_closed(&self, filter: &SessionHistoryFilter, paging: Option<(i64, i64)>) -> RepoResult<Vec<CashSession>> {
        debug!("Listing closed cash sessions with filter: {:?}, paging: {:?}", filter, paging);

        acl::check(
            &*self.acl,
            Resource::CashSessions,
            Action::Read,
            self,
            Some(&TenantSlug::new(filter.tenant_slug.clone())),
        )?;

        let mut sql = format!(
            "SELECT {} FROM cash_sessions WHERE tenant_slug = ? AND closed_at IS NOT NULL",
            SESSION_COLUMNS
        );
        let mut params = params![filter.tenant_slug.clone()];
        if let Some(ref from) = filter.from {
            sql.push_str(&format!(" AND {} >= ?", filter.column()));
            params.push(from.clone().into());
        }
        if let Some(ref to) = filter.to {
            sql.push_str(&format!(" AND {} <= ?", filter.column()));
            params.push(to.clone().into());
        }
        sql.push_str(" ORDER BY closed_at DESC");
        if let Some((limit, offset)) = paging {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(limit.into());
            params.push(offset.into());
        }

        self.db_conn.load::<CashSession>(&sql, &params).map_err(|e| {
            let kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, kind => filter)
        })
    }
}

impl<'a> CheckScope<Scope, TenantSlug> for CashSessionsRepoImpl<'a> {
    fn is_in_scope(&self, tenant_slug: &str, scope: &Scope, obj: Option<&TenantSlug>) -> bool {
        acl::tenant_in_scope(tenant_slug, scope, obj)
    }
}
