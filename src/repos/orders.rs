//! Repo for the orders table

use failure::Error as FailureError;
use failure::Fail;

use crate::db::{DbConnection, Param};
use crate::models::authorization::*;
use crate::models::{
    CountAndTotal, DeliveredOrder, DeliveredTotals, NewOrder, Order, OrderFilter, OrderId, OrderListEntry, OrderStatus,
    PaymentMethod, PAYMENT_STATUS_PAID,
};
use crate::repos::acl;
use crate::repos::error::{Error, ErrorKind, ErrorSource};
use crate::repos::legacy_acl::*;
use crate::repos::types::{RepoResult, RowCount, LATEST_CHANGE_JOIN};

const ORDER_COLUMNS: &str = "id, tenant_slug, customer_name, customer_phone, order_type, table_number, address_json, status, total, \
     payment_method, payment_status, created_at, order_notes, tip_amount, shipping_cost";

const LIST_COLUMNS: &str = "id, tenant_slug, order_type, table_number, address_json, status, total, created_at, customer_phone, \
     customer_name, payment_status, payment_method, tip_amount, shipping_cost";

/// Orders repository
pub trait OrdersRepo {
    /// Find an order by id
    fn get(&self, order_id: OrderId) -> RepoResult<Option<Order>>;

    /// Orders matching the filter, newest first; `paging` is `(limit, offset)`
    fn list(&self, filter: &OrderFilter, paging: Option<(i64, i64)>) -> RepoResult<Vec<OrderListEntry>>;

    /// Number of orders matching the filter
    fn count(&self, filter: &OrderFilter) -> RepoResult<i64>;

    /// Inserts a pending order
    fn create(&self, payload: NewOrder) -> RepoResult<Order>;

    /// Moves an order to `status`, replacing the notes when given
    fn update_status(&self, order_id: OrderId, status: OrderStatus, order_notes: Option<String>) -> RepoResult<Order>;

    fn mark_paid(&self, order_id: OrderId, method: PaymentMethod, tip_amount: i32) -> RepoResult<Order>;

    fn update_total_and_notes(&self, order_id: OrderId, total: i32, order_notes: Option<String>) -> RepoResult<Order>;

    /// Delivered orders whose latest delivery falls in `[from, to]`
    fn delivered_totals(&self, tenant_slug: &str, from: &str, to: Option<&str>) -> RepoResult<DeliveredTotals>;

    fn delivered_in_window(&self, tenant_slug: &str, from: &str, to: Option<&str>) -> RepoResult<Vec<DeliveredOrder>>;

    /// Orders neither terminal nor archived
    fn count_active(&self, tenant_slug: &str) -> RepoResult<i64>;

    /// Count and sum of orders currently in a terminal `status` whose latest move there is inside the window
    fn terminal_totals(&self, tenant_slug: &str, status: OrderStatus, from: Option<&str>, to: Option<&str>) -> RepoResult<CountAndTotal>;
}

pub struct OrdersRepoImpl<'a> {
    pub db_conn: &'a DbConnection,
    pub acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>,
}

impl<'a> OrdersRepoImpl<'a> {
    pub fn new(db_conn: &'a DbConnection, acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>) -> Self {
        Self { db_conn, acl }
    }

    fn load(&self, order_id: OrderId) -> RepoResult<Option<Order>> {
        self.db_conn
            .load_one::<Order>(&format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS), &params![order_id.inner()])
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => order_id)
            })
    }

    /// Loads the order and checks the caller may modify its tenant
    fn load_for_write(&self, order_id: OrderId) -> RepoResult<Order> {
        let order = self.load(order_id)?.ok_or_else(|| {
            let e = format_err!("Order {} not found", order_id);
            ectx!(err e, ErrorKind::NotFound => order_id)
        })?;
        acl::check(
            &*self.acl,
            Resource::Orders,
            Action::Write,
            self,
            Some(&TenantSlug::new(order.tenant_slug.clone())),
        )?;
        Ok(order)
    }

    fn reload(&self, order_id: OrderId) -> RepoResult<Order> {
        self.load(order_id)?.ok_or_else(|| {
            let e = format_err!("Order {} vanished while updating", order_id);
            ectx!(err e, ErrorKind::Internal => order_id)
        })
    }
}

/// `WHERE` body and params shared by the order board, its count and the CSV export
fn filter_clause(filter: &OrderFilter) -> (String, Vec<Param>) {
    let mut sql = "tenant_slug = ?".to_string();
    let mut params = params![filter.tenant_slug.clone()];
    if let Some(ref status) = filter.status {
        sql.push_str(" AND status = ?");
        params.push(status.clone().into());
    }
    if let Some(id) = filter.id {
        sql.push_str(" AND id = ?");
        params.push(id.into());
    } else if let Some(ref q) = filter.q {
        match q.trim().parse::<i32>() {
            Ok(id) => {
                sql.push_str(" AND id = ?");
                params.push(id.into());
            }
            Err(_) => {
                let like = format!("%{}%", q.trim().to_lowercase());
                sql.push_str(
                    " AND (LOWER(COALESCE(address_json, '')) LIKE ? OR LOWER(COALESCE(customer_name, '')) LIKE ? \
                     OR LOWER(COALESCE(customer_phone, '')) LIKE ? OR LOWER(COALESCE(table_number, '')) LIKE ?)",
                );
                for _ in 0..4 {
                    params.push(like.clone().into());
                }
            }
        }
    }
    if let Some(ref from) = filter.from {
        sql.push_str(" AND created_at >= ?");
        params.push(from.clone().into());
    }
    if let Some(ref to) = filter.to {
        sql.push_str(" AND created_at <= ?");
        params.push(to.clone().into());
    }
    if filter.exclude_archived {
        sql.push_str(" AND id NOT IN (SELECT order_id FROM archived_orders)");
    }
    (sql, params)
}

/// Appends `h.last_change` bounds
fn window_clause(sql: &mut String, params: &mut Vec<Param>, from: Option<&str>, to: Option<&str>) {
    if let Some(from) = from {
        sql.push_str(" AND h.last_change >= ?");
        params.push(from.into());
    }
    if let Some(to) = to {
        sql.push_str(" AND h.last_change <= ?");
        params.push(to.into());
    }
}

impl<'a> OrdersRepo for OrdersRepoImpl<'a> {
    fn get(&self, order_id: OrderId) -> RepoResult<Option<Order>> {
        debug!("Getting an order with ID: {}", order_id);

        let order = self.load(order_id)?;
        if let Some(ref order) = order {
            acl::check(
                &*self.acl,
                Resource::Orders,
                Action::Read,
                self,
                Some(&TenantSlug::new(order.tenant_slug.clone())),
            )?;
        }
        Ok(order)
    }

    fn list(&self, filter: &OrderFilter, paging: Option<(i64, i64)>) -> RepoResult<Vec<OrderListEntry>> {
        debug!("Listing orders with filter: {:?}, paging: {:?}", filter, paging);

        acl::check(
            &*self.acl,
            Resource::Orders,
            Action::Read,
            self,
            Some(&TenantSlug::new(filter.tenant_slug.clone())),
        )?;

        let (clause, mut params) = filter_clause(filter);
        let mut sql = format!("SELECT {} FROM orders WHERE {} ORDER BY id DESC", LIST_COLUMNS, clause);
        if let Some((limit, offset)) = paging {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(limit.into());
            params.push(offset.into());
        }

        self.db_conn.load::<OrderListEntry>(&sql, &params).map_err(|e| {
            let kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, kind => filter)
        })
    }

    fn count(&self, filter: &OrderFilter) -> RepoResult<i64> {
        debug!("Counting orders with filter: {:?}", filter);

        acl::check(
            &*self.acl,
            Resource::Orders,
            Action::Read,
            self,
            Some(&TenantSlug::new(filter.tenant_slug.clone())),
        )?;

        let (clause, params) = filter_clause(filter);
        let sql = format!("SELECT CAST(COUNT(*) AS BIGINT) AS count FROM orders WHERE {}", clause);
        self.db_conn
            .load_one::<RowCount>(&sql, &params)
            .map(|row| row.map(|row| row.count).unwrap_or(0))
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => filter)
            })
    }

    fn create(&self, payload: NewOrder) -> RepoResult<Order> {
        debug!("Creating an order using payload: {:?}", payload);

        acl::check(
            &*self.acl,
            Resource::Orders,
            Action::Write,
            self,
            Some(&TenantSlug::new(payload.tenant_slug.clone())),
        )?;

        let id = self
            .db_conn
            .insert(
                "INSERT INTO orders (tenant_slug, customer_name, customer_phone, order_type, table_number, address_json, status, total, \
                 payment_method, payment_status, created_at, order_notes, shipping_cost) \
                 VALUES (?, ?, ?, ?, ?, ?, 'pendiente', ?, ?, ?, ?, ?, ?)",
                &params![
                    payload.tenant_slug.clone(),
                    payload.customer_name.clone(),
                    payload.customer_phone.clone(),
                    payload.order_type.to_string(),
                    payload.table_number.clone(),
                    payload.address_json.clone(),
                    payload.total,
                    None::<String>,
                    None::<String>,
                    payload.created_at.clone(),
                    payload.order_notes.clone(),
                    payload.shipping_cost,
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

        self.reload(OrderId::new(id))
    }

    fn update_status(&self, order_id: OrderId, status: OrderStatus, order_notes: Option<String>) -> RepoResult<Order> {
        debug!("Setting status of order {} to {}", order_id, status);

        self.load_for_write(order_id)?;

        let result = match order_notes {
            Some(ref notes) => self.db_conn.execute(
                "UPDATE orders SET status = ?, order_notes = ? WHERE id = ?",
                &params![status.to_string(), notes.clone(), order_id.inner()],
            ),
            None => self
                .db_conn
                .execute("UPDATE orders SET status = ? WHERE id = ?", &params![status.to_string(), order_id.inner()]),
        };
        result.map_err(|e| {
            let kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, kind => order_id, status)
        })?;

        self.reload(order_id)
    }

    fn mark_paid(&self, order_id: OrderId, method: PaymentMethod, tip_amount: i32) -> RepoResult<Order> {
        debug!("Marking order {} as paid with {}, tip {}", order_id, method, tip_amount);

        self.load_for_write(order_id)?;

        self.db_conn
            .execute(
                "UPDATE orders SET payment_status = ?, payment_method = ?, tip_amount = ? WHERE id = ?",
                &params![PAYMENT_STATUS_PAID, method.to_string(), tip_amount, order_id.inner()],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => order_id, method, tip_amount)
            })?;

        self.reload(order_id)
    }

    fn update_total_and_notes(&self, order_id: OrderId, total: i32, order_notes: Option<String>) -> RepoResult<Order> {
        debug!("Updating total of order {} to {}", order_id, total);

        self.load_for_write(order_id)?;

        let result = match order_notes {
            Some(ref notes) => self.db_conn.execute(
                "UPDATE orders SET total = ?, order_notes = ? WHERE id = ?",
                &params![total, notes.clone(), order_id.inner()],
            ),
            None => self
                .db_conn
                .execute("UPDATE orders SET total = ? WHERE id = ?", &params![total, order_id.inner()]),
        };
        result.map_err(|e| {
            let kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, kind => order_id, total)
        })?;

        self.reload(order_id)
    }

    fn delivered_totals(&self, tenant_slug: &str, from: &str, to: Option<&str>) -> RepoResult<DeliveredTotals> {
        debug!("Summing delivered orders of {} from {} to {:?}", tenant_slug, from, to);

        acl::check(&*self.acl, Resource::Orders, Action::Read, self, Some(&TenantSlug::new(tenant_slug)))?;

        let mut sql = format!(
            "SELECT CAST(COUNT(*) AS BIGINT) AS delivered_count, \
             CAST(COALESCE(SUM(o.total), 0) AS BIGINT) AS base_delivered_total, \
             CAST(COALESCE(SUM(COALESCE(o.tip_amount, 0)), 0) AS BIGINT) AS tip_total, \
             CAST(COALESCE(SUM(COALESCE(o.shipping_cost, 0)), 0) AS BIGINT) AS shipping_total \
             FROM orders o {} WHERE o.tenant_slug = ? AND o.status = 'entregado'",
            LATEST_CHANGE_JOIN
        );
        let mut params = params!["entregado", tenant_slug];
        window_clause(&mut sql, &mut params, Some(from), to);

        self.db_conn
            .load_one::<DeliveredTotals>(&sql, &params)
            .map(Option::unwrap_or_default)
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => tenant_slug, from, to)
            })
    }

    fn delivered_in_window(&self, tenant_slug: &str, from: &str, to: Option<&str>) -> RepoResult<Vec<DeliveredOrder>> {
        debug!("Listing delivered orders of {} from {} to {:?}", tenant_slug, from, to);

        acl::check(&*self.acl, Resource::Orders, Action::Read, self, Some(&TenantSlug::new(tenant_slug)))?;

        let mut sql = format!(
            "SELECT o.id, o.created_at, o.total, o.payment_method FROM orders o {} \
             WHERE o.tenant_slug = ? AND o.status = 'entregado'",
            LATEST_CHANGE_JOIN
        );
        let mut params = params!["entregado", tenant_slug];
        window_clause(&mut sql, &mut params, Some(from), to);
        sql.push_str(" ORDER BY o.id DESC");

        self.db_conn.load::<DeliveredOrder>(&sql, &params).map_err(|e| {
            let kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, kind => tenant_slug, from, to)
        })
    }

    fn count_active(&self, tenant_slug: &str) -> RepoResult<i64> {
        debug!("Counting active orders of {}", tenant_slug);

        acl::check(&*self.acl, Resource::Orders, Action::Read, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .load_one::<RowCount>(
                "SELECT CAST(COUNT(*) AS BIGINT) AS count FROM orders WHERE tenant_slug = ? \
                 AND status NOT IN ('entregado', 'cancelado') AND id NOT IN (SELECT order_id FROM archived_orders)",
                &params![tenant_slug],
            )
            .map(|row| row.map(|row| row.count).unwrap_or(0))
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => tenant_slug)
            })
    }

    fn terminal_totals(&self, tenant_slug: &str, status: OrderStatus, from: Option<&str>, to: Option<&str>) -> RepoResult<CountAndTotal> {
        debug!("Summing {} orders of {} from {:?} to {:?}", status, tenant_slug, from, to);

        acl::check(&*self.acl, Resource::Orders, Action::Read, self, Some(&TenantSlug::new(tenant_slug)))?;

        let status = status.to_string();
        let mut sql = format!(
            "SELECT CAST(COUNT(*) AS BIGINT) AS count, CAST(COALESCE(SUM(o.total), 0) AS BIGINT) AS total \
             FROM orders o {} WHERE o.tenant_slug = ? AND o.status = ?",
            LATEST_CHANGE_JOIN
        );
        let mut params = params![status.clone(), tenant_slug, status.clone()];
        window_clause(&mut sql, &mut params, from, to);

        self.db_conn
            .load_one::<CountAndTotal>(&sql, &params)
            .map(Option::unwrap_or_default)
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => tenant_slug, status, from, to)
            })
    }
}

impl<'a> CheckScope<Scope, TenantSlug> for OrdersRepoImpl<'a> {
    fn is_in_scope(&self, tenant_slug: &str, scope: &Scope, obj: Option<&TenantSlug>) -> bool {
        acl::tenant_in_scope(tenant_slug, scope, obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_q_matches_the_id() {
        let filter = OrderFilter {
            tenant_slug: "local".to_string(),
            q: Some(" 42 ".to_string()),
            ..OrderFilter::default()
        };
        let (sql, params) = filter_clause(&filter);
        assert_eq!(sql, "tenant_slug = ? AND id = ?");
        assert_eq!(params, params!["local", 42]);
    }

    #[test]
    fn explicit_id_wins_over_q() {
        let filter = OrderFilter {
            tenant_slug: "local".to_string(),
            id: Some(7),
            q: Some("mitre".to_string()),
            exclude_archived: true,
            ..OrderFilter::default()
        };
        let (sql, params) = filter_clause(&filter);
        assert!(sql.ends_with("AND id = ? AND id NOT IN (SELECT order_id FROM archived_orders)"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn text_q_searches_four_columns() {
        let filter = OrderFilter {
            tenant_slug: "local".to_string(),
            q: Some("Mitre".to_string()),
            from: Some("2024-01-01".to_string()),
            ..OrderFilter::default()
        };
        let (sql, params) = filter_clause(&filter);
        assert!(sql.contains("LOWER(COALESCE(table_number, '')) LIKE ?"));
        assert_eq!(params.len(), 6);
        assert_eq!(params[1], Param::Text("%mitre%".to_string()));
        assert_eq!(params[5], Param::Text("2024-01-01".to_string()));
    }
}
