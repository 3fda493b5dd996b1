//! Repo for cash_movements table

use failure::Error as FailureError;
use failure::Fail;

use crate::db::DbConnection;
use crate::models::authorization::*;
use crate::models::{CashMovement, MovementTotal, NewCashMovement};
use crate::repos::acl;
use crate::repos::error::{Error, ErrorKind, ErrorSource};
use crate::repos::legacy_acl::*;
use crate::repos::types::RepoResult;

const MOVEMENT_COLUMNS: &str = "m.id, m.session_id, m.type AS movement_type, m.amount, m.note, m.actor, m.created_at, m.payment_method";

/// Cash movements repository
pub trait CashMovementsRepo {
    /// Records a movement in a session of `tenant_slug`
    fn create(&self, tenant_slug: &str, payload: NewCashMovement) -> RepoResult<CashMovement>;

    /// Sums of a session grouped by type and payment method
    fn totals(&self, session_id: i32) -> RepoResult<Vec<MovementTotal>>;

    fn list_by_session(&self, session_id: i32) -> RepoResult<Vec<CashMovement>>;

    /// Movements of every session of the tenant created inside the range
    fn list_by_range(&self, tenant_slug: &str, from: Option<&str>, to: Option<&str>) -> RepoResult<Vec<CashMovement>>;
}

pub struct CashMovementsRepoImpl<'a> {
    pub db_conn: &'a DbConnection,
    pub acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>,
}

impl<'a> CashMovementsRepoImpl<'a> {
    pub fn new(db_conn: &'a DbConnection, acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>) -> Self {
        Self { db_conn, acl }
    }
}

impl<'a> CashMovementsRepo for CashMovementsRepoImpl<'a> {
    fn create(&self, tenant_slug: &str, payload: NewCashMovement) -> RepoResult<CashMovement> {
        debug!("Creating a cash movement using payload: {:?}", payload);

        acl::check(&*self.acl, Resource::CashSessions, Action::Write, self, Some(&TenantSlug::new(tenant_slug)))?;

        let id = self
            .db_conn
            .insert(
                "INSERT INTO cash_movements (session_id, type, amount, note, actor, created_at, payment_method) VALUES (?, ?, ?, ?, ?, ?, ?)",
                &params![
                    payload.session_id,
                    payload.movement_type.to_string(),
                    payload.amount,
                    payload.note.clone(),
                    payload.actor.clone(),
                    payload.created_at.clone(),
                    payload.payment_method.clone(),
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

        self.db_conn
            .load_one::<CashMovement>(
                &format!("SELECT {} FROM cash_movements m WHERE m.id = ?", MOVEMENT_COLUMNS),
                &params![id],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => id)
            })?
            .ok_or_else(|| {
                let e = format_err!("Cash movement {} vanished after insert", id);
                ectx!(err e, ErrorKind::Internal => id)
            })
    }

    fn totals(&self, session_id: i32) -> RepoResult<Vec<MovementTotal>> {
        debug!("Summing movements of cash session {}", session_id);

        acl::check(&*self.acl, Resource::CashSessions, Action::Read, self, None)?;

        self.db_conn
            .load::<MovementTotal>(
                "SELECT type AS movement_type, payment_method, CAST(COALESCE(SUM(amount), 0) AS BIGINT) AS amount \
                 FROM cash_movements WHERE session_id = ? GROUP BY type, payment_method",
                &params![session_id],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => session_id)
            })
    }

    fn list_by_session(&self, session_id: i32) -> RepoResult<Vec<CashMovement>> {
        debug!("Listing movements of cash session {}", session_id);

        acl::check(&*self.acl, Resource::CashSessions, Action::Read, self, None)?;

        self.db_conn
            .load::<CashMovement>(
                &format!("SELECT {} FROM cash_movements m WHERE m.session_id = ? ORDER BY m.id ASC", MOVEMENT_COLUMNS),
                &params![session_id],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => session_id)
            })
    }

    fn list_by_range(&self, tenant_slug: &str, from: Option<&str>, to: Option<&str>) -> RepoResult<Vec<CashMovement>> {
        debug!("Listing movements of {} from {:?} to {:?}", tenant_slug, from, to);

        acl::check(&*self.acl, Resource::CashSessions, Action::Read, self, Some(&TenantSlug::new(tenant_slug)))?;

        let mut sql = format!(
            "SELECT {} FROM cash_movements m JOIN cash_sessions s ON m.session_id = s.id WHERE s.tenant_slug = ?",
            MOVEMENT_COLUMNS
        );
        let mut params = params![tenant_slug];
        if let Some(from) = from {
            sql.push_str(" AND m.created_at >= ?");
            params.push(from.into());
        }
        if let Some(to) = to {
            sql.push_str(" AND m.created_at <= ?");
            params.push(to.into());
        }
        sql.push_str(" ORDER BY m.id ASC");

        self.db_conn.load::<CashMovement>(&sql, &params).map_err(|e| {
            let kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, kind => tenant_slug, from, to)
        })
    }
}

impl<'a> CheckScope<Scope, TenantSlug> for CashMovementsRepoImpl<'a> {
    fn is_in_scope(&self, tenant_slug: &str, scope: &Scope, obj: Option<&TenantSlug>) -> bool {
        acl::tenant_in_scope(tenant_slug, scope, obj)
    }
}
