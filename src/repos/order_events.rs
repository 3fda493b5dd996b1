//! Repo for order_events table, the audit trail of an order

use failure::Error as FailureError;
use failure::Fail;

use crate::db::DbConnection;
use crate::models::authorization::*;
use crate::models::time::now_iso;
use crate::models::{NewOrderEvent, OrderEvent, OrderId};
use crate::repos::acl;
use crate::repos::error::{Error, ErrorKind, ErrorSource};
use crate::repos::legacy_acl::*;
use crate::repos::types::RepoResult;

pub trait OrderEventsRepo {
    /// Events of an order, oldest first
    fn list(&self, order_id: OrderId) -> RepoResult<Vec<OrderEvent>>;

    /// Appends an event to an order of `tenant_slug`
    fn create(&self, tenant_slug: &str, payload: NewOrderEvent) -> RepoResult<i32>;
}

pub struct OrderEventsRepoImpl<'a> {
    pub db_conn: &'a DbConnection,
    pub acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>,
}

impl<'a> OrderEventsRepoImpl<'a> {
    pub fn new(db_conn: &'a DbConnection, acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>) -> Self {
        Self { db_conn, acl }
    }
}

impl<'a> OrderEventsRepo for OrderEventsRepoImpl<'a> {
    fn list(&self, order_id: OrderId) -> RepoResult<Vec<OrderEvent>> {
        debug!("Getting events of order {}", order_id);

        acl::check(&*self.acl, Resource::Orders, Action::Read, self, None)?;

        self.db_conn
            .load::<OrderEvent>(
                "SELECT id, event_type, actor, terminal, amount_delta, payload_json, created_at FROM order_events \
                 WHERE order_id = ? ORDER BY id ASC",
                &params![order_id.inner()],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => order_id)
            })
    }

    fn create(&self, tenant_slug: &str, payload: NewOrderEvent) -> RepoResult<i32> {
        debug!("Creating an order event using payload: {:?}", payload);

        acl::check(&*self.acl, Resource::Orders, Action::Write, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .insert(
                "INSERT INTO order_events (order_id, event_type, actor, terminal, amount_delta, payload_json, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                &params![
                    payload.order_id.inner(),
                    payload.event_type.clone(),
                    payload.actor.clone(),
                    payload.terminal.clone(),
                    payload.amount_delta,
                    payload.payload.to_string(),
                    now_iso(),
                ],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => payload)
            })?
            .ok_or_else(|| {
                let e = format_err!("Insert returned no id");
                ectx!(err e, ErrorKind::Internal => payload)
            })
    }
}

impl<'a> CheckScope<Scope, TenantSlug> for OrderEventsRepoImpl<'a> {
    fn is_in_scope(&self, tenant_slug: &str, scope: &Scope, obj: Option<&TenantSlug>) -> bool {
        acl::tenant_in_scope(tenant_slug, scope, obj)
    }
}
