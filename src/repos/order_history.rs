//! Repo for order_status_history table

use failure::Error as FailureError;
use failure::Fail;

use crate::db::DbConnection;
use crate::models::authorization::*;
use crate::models::{OrderId, OrderStatus, OrderType, StageTimes, StatusChange, StatusReached};
use crate::repos::acl;
use crate::repos::error::{Error, ErrorKind, ErrorSource};
use crate::repos::legacy_acl::*;
use crate::repos::types::RepoResult;

/// Status history repository
pub trait OrderHistoryRepo {
    /// Status changes of an order, oldest first
    fn list(&self, order_id: OrderId) -> RepoResult<Vec<StatusChange>>;

    /// Records that an order of `tenant_slug` moved to `status`
    fn create(&self, tenant_slug: &str, order_id: OrderId, status: OrderStatus, changed_at: &str, changed_by: &str) -> RepoResult<()>;

    /// First pass through each kitchen stage of orders delivered inside the window
    fn stage_times(&self, tenant_slug: &str, from: Option<&str>, to: Option<&str>) -> RepoResult<Vec<StageTimes>>;

    /// Last 50 orders of a type created since `since` that reached `status`
    fn reached_status(&self, tenant_slug: &str, order_type: OrderType, status: OrderStatus, since: &str) -> RepoResult<Vec<StatusReached>>;
}

pub struct OrderHistoryRepoImpl<'a> {
    pub db_conn: &'a DbConnection,
    pub acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>,
}

impl<'a> OrderHistoryRepoImpl<'a> {
    pub fn new(db_conn: &'a DbConnection, acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>) -> Self {
        Self { db_conn, acl }
    }
}

fn first_change(status: &str, alias: &str) -> String {
    format!(
        "(SELECT h.changed_at FROM order_status_history h WHERE h.order_id = o.id AND h.status = '{}' ORDER BY h.id ASC LIMIT 1) AS {}",
        status, alias
    )
}

impl<'a> OrderHistoryRepo for OrderHistoryRepoImpl<'a> {
    fn list(&self, order_id: OrderId) -> RepoResult<Vec<StatusChange>> {
        debug!("Getting status history of order {}", order_id);

        acl::check(&*self.acl, Resource::Orders, Action::Read, self, None)?;

        self.db_conn
            .load::<StatusChange>(
                "SELECT status, changed_at, changed_by FROM order_status_history WHERE order_id = ? ORDER BY id ASC",
                &params![order_id.inner()],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => order_id)
            })
    }

    fn create(&self, tenant_slug: &str, order_id: OrderId, status: OrderStatus, changed_at: &str, changed_by: &str) -> RepoResult<()> {
        debug!("Recording status {} of order {} by {}", status, order_id, changed_by);

        acl::check(&*self.acl, Resource::Orders, Action::Write, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .execute(
                "INSERT INTO order_status_history (order_id, status, changed_at, changed_by) VALUES (?, ?, ?, ?)",
                &params![order_id.inner(), status.to_string(), changed_at, changed_by],
            )
            .map(|_| ())
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => order_id, status, changed_at, changed_by)
            })
    }

    fn stage_times(&self, tenant_slug: &str, from: Option<&str>, to: Option<&str>) -> RepoResult<Vec<StageTimes>> {
        debug!("Getting stage times of {} from {:?} to {:?}", tenant_slug, from, to);

        acl::check(&*self.acl, Resource::Orders, Action::Read, self, Some(&TenantSlug::new(tenant_slug)))?;

        let mut delivered = "EXISTS (SELECT 1 FROM order_status_history h WHERE h.order_id = o.id AND h.status = 'entregado'".to_string();
        let mut params = params![tenant_slug];
        if let Some(from) = from {
            delivered.push_str(" AND h.changed_at >= ?");
            params.push(from.into());
        }
        if let Some(to) = to {
            delivered.push_str(" AND h.changed_at <= ?");
            params.push(to.into());
        }
        delivered.push(')');

        let sql = format!(
            "SELECT o.created_at, {}, {}, {} FROM orders o WHERE o.tenant_slug = ? AND {}",
            first_change("preparacion", "prep_at"),
            first_change("listo", "listo_at"),
            first_change("entregado", "entregado_at"),
            delivered
        );

        self.db_conn.load::<StageTimes>(&sql, &params).map_err(|e| {
            let kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, kind => tenant_slug, from, to)
        })
    }

    fn reached_status(&self, tenant_slug: &str, order_type: OrderType, status: OrderStatus, since: &str) -> RepoResult<Vec<StatusReached>> {
        debug!("Getting {} orders of {} that reached {} since {}", order_type, tenant_slug, status, since);

        acl::check(&*self.acl, Resource::Orders, Action::Read, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .load::<StatusReached>(
                "SELECT o.created_at, h.changed_at FROM orders o JOIN order_status_history h ON o.id = h.order_id \
                 WHERE o.tenant_slug = ? AND o.order_type = ? AND h.status = ? AND o.created_at >= ? \
                 ORDER BY o.id DESC LIMIT 50",
                &params![tenant_slug, order_type.to_string(), status.to_string(), since],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => tenant_slug, order_type, status, since)
            })
    }
}

impl<'a> CheckScope<Scope, TenantSlug> for OrderHistoryRepoImpl<'a> {
    fn is_in_scope(&self, tenant_slug: &str, scope: &Scope, obj: Option<&TenantSlug>) -> bool {
        acl::tenant_in_scope(tenant_slug, scope, obj)
    }
}
