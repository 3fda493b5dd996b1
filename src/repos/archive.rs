//! Repo for archived_orders table

use failure::Error as FailureError;
use failure::Fail;

use crate::db::{DbConnection, Param};
use crate::models::authorization::*;
use crate::models::{ArchiveCandidate, ArchiveEntry, ArchiveFilter, ArchiveType, CountAndTotal, SearchTerm};
use crate::repos::acl;
use crate::repos::error::{Error, ErrorKind, ErrorSource};
use crate::repos::legacy_acl::*;
use crate::repos::types::{RepoResult, RowCount, LATEST_CHANGE_JOIN};

const ENTRY_FROM: &str = "FROM archived_orders a \
     JOIN orders o ON o.id = a.order_id \
     LEFT JOIN (\
       SELECT x.order_id, x.status AS last_status, x.changed_at AS last_change \
       FROM order_status_history x \
       JOIN (SELECT order_id, MAX(changed_at) AS mc FROM order_status_history GROUP BY order_id) y \
       ON y.order_id = x.order_id AND y.mc = x.changed_at\
     ) h ON h.order_id = o.id";

const ENTRY_COLUMNS: &str = "o.id, o.created_at, o.order_type, o.table_number, o.address_json, o.total, o.status, \
     o.customer_name, o.customer_phone, h.last_status, h.last_change, a.archived_at, o.payment_status";

/// Archive repository
pub trait ArchiveRepo {
    /// Archived orders matching the filter, highest order id first; `paging` is `(limit, offset)`
    fn list(&self, filter: &ArchiveFilter, paging: Option<(i64, i64)>) -> RepoResult<Vec<ArchiveEntry>>;

    /// Number of rows `list` would return without paging
    fn count(&self, filter: &ArchiveFilter) -> RepoResult<i64>;

    /// Count and order totals of one archive type under the filter's dates and order type
    fn totals(&self, filter: &ArchiveFilter, archive_type: ArchiveType) -> RepoResult<CountAndTotal>;

    /// Marks an order archived; `false` when it already was with that type
    fn create(&self, order_id: i32, tenant_slug: &str, archive_type: ArchiveType, archived_at: &str) -> RepoResult<bool>;

    /// Orders of the tenant with no archive row of any type
    fn unarchived(&self, tenant_slug: &str) -> RepoResult<Vec<ArchiveCandidate>>;

    /// Orders whose latest trigger status change happened before `cutoff` and that are
    /// not archived with `archive_type` yet. With `paid_only`, delivered orders must also be paid.
    fn candidates(&self, archive_type: ArchiveType, cutoff: &str, tenant_slug: Option<&str>, paid_only: bool) -> RepoResult<Vec<ArchiveCandidate>>;
}

pub struct ArchiveRepoImpl<'a> {
    pub db_conn: &'a DbConnection,
    pub acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>,
}

impl<'a> ArchiveRepoImpl<'a> {
    pub fn new(db_conn: &'a DbConnection, acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>) -> Self {
        Self { db_conn, acl }
    }
}

/// `WHERE` clause shared by list, count and export
fn filter_clause(filter: &ArchiveFilter) -> (String, Vec<Param>) {
    let mut sql = " WHERE a.tenant_slug = ?".to_string();
    let mut params = params![filter.tenant_slug.clone()];
    if let Some(ref archive_type) = filter.archive_type {
        sql.push_str(" AND a.type = ?");
        params.push(archive_type.clone().into());
    }
    date_clause(filter, &mut sql, &mut params);
    match filter.q {
        Some(SearchTerm::OrderId(id)) => {
            sql.push_str(" AND o.id = ?");
            params.push(id.into());
        }
        Some(SearchTerm::Text { ref like, .. }) => {
            sql.push_str(
                " AND (LOWER(COALESCE(o.address_json, '')) LIKE ? OR LOWER(COALESCE(o.table_number, '')) LIKE ? \
                 OR LOWER(COALESCE(o.customer_name, '')) LIKE ?)",
            );
            params.extend((0..3).map(|_| Param::from(like.clone())));
        }
        None => {}
    }
    (sql, params)
}

fn date_clause(filter: &ArchiveFilter, sql: &mut String, params: &mut Vec<Param>) {
    if let Some(ref from) = filter.from {
        sql.push_str(&format!(" AND {} >= ?", filter.date_column()));
        params.push(from.clone().into());
    }
    if let Some(ref to) = filter.to {
        sql.push_str(&format!(" AND {} <= ?", filter.date_column()));
        params.push(to.clone().into());
    }
    if let Some(ref order_type) = filter.order_type {
        sql.push_str(" AND o.order_type = ?");
        params.push(order_type.clone().into());
    }
}

impl<'a> ArchiveRepo for ArchiveRepoImpl<'a> {
    fn list(&self, filter: &ArchiveFilter, paging: Option<(i64, i64)>) -> RepoResult<Vec<ArchiveEntry>> {
        debug!("Listing archived orders with filter: {:?}, paging: {:?}", filter, paging);

        acl::check(
            &*self.acl,
            Resource::Archive,
            Action::Read,
            self,
            Some(&TenantSlug::new(filter.tenant_slug.clone())),
        )?;

        let (clause, mut params) = filter_clause(filter);
        let mut sql = format!("SELECT {} {}{} ORDER BY o.id DESC", ENTRY_COLUMNS, ENTRY_FROM, clause);
        if let Some((limit, offset)) = paging {
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(limit.into());
            params.push(offset.into());
        }

        let rows = self.db_conn.load::<ArchiveEntry>(&sql, &params).map_err(|e| {
            let kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, kind => filter)
        })?;

        Ok(match filter.q {
            Some(SearchTerm::Text { ref folded, .. }) => rows.into_iter().filter(|row| row.matches_folded(folded)).collect(),
            _ => rows,
        })
    }

    fn count(&self, filter: &ArchiveFilter) -> RepoResult<i64> {
        debug!("Counting archived orders with filter: {:?}", filter);

        acl::check(
            &*self.acl,
            Resource::Archive,
            Action::Read,
            self,
            Some(&TenantSlug::new(filter.tenant_slug.clone())),
        )?;

        let (clause, params) = filter_clause(filter);
        self.db_conn
            .load_one::<RowCount>(&format!("SELECT COUNT(*) AS count {}{}", ENTRY_FROM, clause), &params)
            .map(|row| row.map(|row| row.count).unwrap_or(0))
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => filter)
            })
    }

    fn totals(&self, filter: &ArchiveFilter, archive_type: ArchiveType) -> RepoResult<CountAndTotal> {
        debug!("Summing archived {} orders with filter: {:?}", archive_type, filter);

        acl::check(
            &*self.acl,
            Resource::Archive,
            Action::Read,
            self,
            Some(&TenantSlug::new(filter.tenant_slug.clone())),
        )?;

        let mut sql = "SELECT COUNT(*) AS count, CAST(COALESCE(SUM(o.total), 0) AS BIGINT) AS total \
                       FROM archived_orders a JOIN orders o ON o.id = a.order_id \
                       WHERE a.tenant_slug = ? AND a.type = ?"
            .to_string();
        let mut params = params![filter.tenant_slug.clone(), archive_type.to_string()];
        date_clause(filter, &mut sql, &mut params);

        self.db_conn
            .load_one::<CountAndTotal>(&sql, &params)
            .map(Option::unwrap_or_default)
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => filter, archive_type)
            })
    }

    fn create(&self, order_id: i32, tenant_slug: &str, archive_type: ArchiveType, archived_at: &str) -> RepoResult<bool> {
        debug!("Archiving order {} of {} as {}", order_id, tenant_slug, archive_type);

        acl::check(&*self.acl, Resource::Archive, Action::Write, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .insert(
                "INSERT OR IGNORE INTO archived_orders (order_id, tenant_slug, type, archived_at) VALUES (?, ?, ?, ?)",
                &params![order_id, tenant_slug, archive_type.to_string(), archived_at],
            )
            .map(|id| id.is_some())
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => order_id, tenant_slug, archive_type, archived_at)
            })
    }

    fn unarchived(&self, tenant_slug: &str) -> RepoResult<Vec<ArchiveCandidate>> {
        debug!("Listing unarchived orders of {}", tenant_slug);

        acl::check(&*self.acl, Resource::Archive, Action::Read, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .load::<ArchiveCandidate>(
                "SELECT id AS order_id, tenant_slug FROM orders \
                 WHERE tenant_slug = ? AND id NOT IN (SELECT order_id FROM archived_orders) ORDER BY id ASC",
                &params![tenant_slug],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => tenant_slug)
            })
    }

    fn candidates(&self, archive_type: ArchiveType, cutoff: &str, tenant_slug: Option<&str>, paid_only: bool) -> RepoResult<Vec<ArchiveCandidate>> {
        debug!("Looking for {} archive candidates before {} of {:?}", archive_type, cutoff, tenant_slug);

        acl::check(
            &*self.acl,
            Resource::Archive,
            Action::Read,
            self,
            tenant_slug.map(TenantSlug::new).as_ref(),
        )?;

        let status = match archive_type.trigger_status() {
            Some(status) => status,
            None => return Ok(vec![]),
        };

        let mut sql = format!(
            "SELECT o.id AS order_id, o.tenant_slug FROM orders o {} \
             LEFT JOIN archived_orders a ON a.order_id = o.id AND a.type = ? \
             WHERE a.order_id IS NULL AND h.last_change <= ?",
            LATEST_CHANGE_JOIN
        );
        let mut params = params![status, archive_type.to_string(), cutoff];
        if paid_only && archive_type == ArchiveType::Delivered {
            sql.push_str(" AND o.payment_status = 'paid'");
        }
        if let Some(tenant_slug) = tenant_slug {
            sql.push_str(" AND o.tenant_slug = ?");
            params.push(tenant_slug.into());
        }
        sql.push_str(" ORDER BY o.id ASC");

        self.db_conn.load::<ArchiveCandidate>(&sql, &params).map_err(|e| {
            let kind = ErrorKind::from(&e);
            ectx!(err e, ErrorSource::Diesel, kind => archive_type, cutoff, tenant_slug)
        })
    }
}

impl<'a> CheckScope<Scope, TenantSlug> for ArchiveRepoImpl<'a> {
    fn is_in_scope(&self, tenant_slug: &str, scope: &Scope, obj: Option<&TenantSlug>) -> bool {
        acl::tenant_in_scope(tenant_slug, scope, obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_search_binds_the_pattern_three_times() {
        let filter = ArchiveFilter::new(
            "local".to_string(),
            Some("delivered".to_string()),
            Some("order"),
            Some("2024-03-01".to_string()),
            None,
            Some("delivery".to_string()),
            Some("dir: Peña"),
        );
        let (sql, params) = filter_clause(&filter);
        assert_eq!(
            sql,
            " WHERE a.tenant_slug = ? AND a.type = ? AND o.created_at >= ? AND o.order_type = ? \
             AND (LOWER(COALESCE(o.address_json, '')) LIKE ? OR LOWER(COALESCE(o.table_number, '')) LIKE ? \
             OR LOWER(COALESCE(o.customer_name, '')) LIKE ?)"
        );
        assert_eq!(params.len(), 7);
        assert_eq!(params[6], Param::from("%peña%"));
    }

    #[test]
    fn numeric_search_matches_the_order_id() {
        let filter = ArchiveFilter::new("local".to_string(), None, None, None, Some("2024-03-02".to_string()), None, Some("17"));
        let (sql, params) = filter_clause(&filter);
        assert_eq!(sql, " WHERE a.tenant_slug = ? AND a.archived_at <= ? AND o.id = ?");
        assert_eq!(params[1], Param::from("2024-03-02T23:59:59"));
        assert_eq!(params[2], Param::from(17));
    }
}
