//! Repo for order_items table

use failure::Error as FailureError;
use failure::Fail;

use crate::db::{DbConnection, Param};
use crate::models::authorization::*;
use crate::models::{NewOrderItem, OrderId, OrderItem};
use crate::repos::acl;
use crate::repos::error::{Error, ErrorKind, ErrorSource};
use crate::repos::legacy_acl::*;
use crate::repos::types::RepoResult;

/// Order items repository
pub trait OrderItemsRepo {
    /// Items of an order in insertion order
    fn list(&self, order_id: OrderId) -> RepoResult<Vec<OrderItem>>;

    /// Inserts an item and returns its id
    fn create(&self, payload: NewOrderItem) -> RepoResult<i32>;

    /// Sets quantity and notes of an item of the order
    fn update(&self, tenant_slug: &str, order_id: OrderId, item_id: i32, qty: i32, notes: &str) -> RepoResult<()>;

    /// Deletes every item of the order whose id is not in `keep`
    fn delete_except(&self, tenant_slug: &str, order_id: OrderId, keep: &[i32]) -> RepoResult<usize>;
}

pub struct OrderItemsRepoImpl<'a> {
    pub db_conn: &'a DbConnection,
    pub acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>,
}

impl<'a> OrderItemsRepoImpl<'a> {
    pub fn new(db_conn: &'a DbConnection, acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>) -> Self {
        Self { db_conn, acl }
    }
}

impl<'a> OrderItemsRepo for OrderItemsRepoImpl<'a> {
    fn list(&self, order_id: OrderId) -> RepoResult<Vec<OrderItem>> {
        debug!("Getting items of order {}", order_id);

        acl::check(&*self.acl, Resource::Orders, Action::Read, self, None)?;

        self.db_conn
            .load::<OrderItem>(
                "SELECT id, product_id, name, qty, unit_price, modifiers_json, notes FROM order_items WHERE order_id = ? ORDER BY id ASC",
                &params![order_id.inner()],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => order_id)
            })
    }

    fn create(&self, payload: NewOrderItem) -> RepoResult<i32> {
        debug!("Creating an order item using payload: {:?}", payload);

        acl::check(
            &*self.acl,
            Resource::Orders,
            Action::Write,
            self,
            Some(&TenantSlug::new(payload.tenant_slug.clone())),
        )?;

        self.db_conn
            .insert(
                "INSERT INTO order_items (order_id, tenant_slug, product_id, name, qty, unit_price, modifiers_json, notes) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                &params![
                    payload.order_id.inner(),
                    payload.tenant_slug.clone(),
                    payload.product_id.clone(),
                    payload.name.clone(),
                    payload.qty,
                    payload.unit_price,
                    payload.modifiers_json.clone(),
                    payload.notes.clone(),
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

    fn update(&self, tenant_slug: &str, order_id: OrderId, item_id: i32, qty: i32, notes: &str) -> RepoResult<()> {
        debug!("Updating item {} of order {}: qty {}", item_id, order_id, qty);

        acl::check(&*self.acl, Resource::Orders, Action::Write, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .execute(
                "UPDATE order_items SET qty = ?, notes = ? WHERE id = ? AND order_id = ?",
                &params![qty, notes, item_id, order_id.inner()],
            )
            .map(|_| ())
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => order_id, item_id, qty, notes)
            })
    }

    fn delete_except(&self, tenant_slug: &str, order_id: OrderId, keep: &[i32]) -> RepoResult<usize> {
        debug!("Deleting items of order {} except {:?}", order_id, keep);

        acl::check(&*self.acl, Resource::Orders, Action::Write, self, Some(&TenantSlug::new(tenant_slug)))?;

        let mut sql = "DELETE FROM order_items WHERE order_id = ?".to_string();
        let mut params = params![order_id.inner()];
        if !keep.is_empty() {
            let placeholders = vec!["?"; keep.len()].join(", ");
            sql.push_str(&format!(" AND id NOT IN ({})", placeholders));
            params.extend(keep.iter().map(|id| Param::from(*id)));
        }

        self.db_conn.execute(&sql, &params).map_err(|e| {
            let kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, kind => order_id, keep)
        })
    }
}

impl<'a> CheckScope<Scope, TenantSlug> for OrderItemsRepoImpl<'a> {
    fn is_in_scope(&self, tenant_slug: &str, scope: &Scope, obj: Option<&TenantSlug>) -> bool {
        acl::tenant_in_scope(tenant_slug, scope, obj)
    }
}
