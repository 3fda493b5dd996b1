//! Archive of finished orders: browsing, exports, metrics and the automatic sweep
use failure::Fail;
use futures::Future;

use super::error::{fail, invalid, Error, ErrorKind};
use super::types::{ServiceFuture, ServiceResult};
use super::Service;
use crate::db::DbConnection;
use crate::models::time::{expand_date_bound, hours_ago, now_iso};
use crate::models::*;
use crate::repos::repo_factory::ReposFactory;

pub trait ArchiveService {
    /// Page of archived orders and the number of matches
    fn list_archive(&self, filter: ArchiveFilter, limit: i64, offset: i64) -> ServiceFuture<(Vec<ArchiveEntry>, i64)>;
    /// Orders the sweep would archive with `archive_type` if it ran `hours` after the trigger status
    fn eligible_count(&self, archive_type: String, hours: i64, tenant_slug: Option<String>) -> ServiceFuture<i64>;
    fn export_archive(&self, filter: ArchiveFilter) -> ServiceFuture<Vec<ArchiveEntry>>;
    fn archive_metrics(&self, filter: ArchiveFilter) -> ServiceFuture<ArchiveMetrics>;
    /// Archives one order by hand; archiving twice with the same type is a no-op
    fn archive_order(&self, order_id: Option<i32>, archive_type: String) -> ServiceFuture<ArchiveType>;
    /// Archives every order of the tenant that is not archived yet
    fn reset_tenant(&self, tenant_slug: String) -> ServiceFuture<usize>;
    /// Dashboard counters; failures read as zeros
    fn dashboard_metrics(&self, tenant_slug: String, from: Option<String>, to: Option<String>) -> ServiceFuture<DashboardMetrics>;
    fn auto_archive(&self) -> ServiceFuture<SweepReport>;
}

/// One pass of the automatic archive with `cutoff = now - threshold_hours`
pub fn sweep<F: ReposFactory>(conn: &DbConnection, repo_factory: &F, threshold_hours: i64) -> ServiceResult<SweepReport> {
    let archive_repo = repo_factory.create_archive_repo_with_sys_acl(conn);
    let cutoff = hours_ago(threshold_hours);
    conn.transaction::<_, Error, _>(|| {
        let mut report = SweepReport::default();
        for archive_type in &[ArchiveType::Delivered, ArchiveType::Canceled] {
            let candidates = archive_repo
                .candidates(*archive_type, &cutoff, None, true)
                .map_err(ectx!(convert => archive_type, cutoff))?;
            for candidate in candidates {
                let created = archive_repo
                    .create(candidate.order_id, &candidate.tenant_slug, *archive_type, &cutoff)
                    .map_err(ectx!(convert => candidate.order_id, archive_type))?;
                if created {
                    match archive_type {
                        ArchiveType::Delivered => report.delivered += 1,
                        _ => report.canceled += 1,
                    }
                }
            }
        }
        Ok(report)
    })
}

impl<F: ReposFactory> ArchiveService for Service<F> {
    fn list_archive(&self, filter: ArchiveFilter, limit: i64, offset: i64) -> ServiceFuture<(Vec<ArchiveEntry>, i64)> {
        debug!("Listing archive with {:?}, limit {}, offset {}", filter, limit, offset);
        let repo_factory = self.static_context.repo_factory.clone();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_archive_repo_with_sys_acl(&conn);
            let entries = repo.list(&filter, Some((limit, offset))).map_err(ectx!(convert => filter))?;
            let total = repo.count(&filter).map_err(ectx!(convert => filter))?;
            Ok((entries, total))
        })
    }

    fn eligible_count(&self, archive_type: String, hours: i64, tenant_slug: Option<String>) -> ServiceFuture<i64> {
        debug!("Counting {} archive candidates older than {}h of {:?}", archive_type, hours, tenant_slug);
        let repo_factory = self.static_context.repo_factory.clone();
        self.spawn_on_pool(move |conn| {
            let archive_type = match archive_type.parse::<ArchiveType>() {
                Ok(ArchiveType::Reset) | Err(_) => return fail(invalid("type", "type inválido")),
                Ok(archive_type) => archive_type,
            };
            let repo = repo_factory.create_archive_repo_with_sys_acl(&conn);
            let cutoff = hours_ago(hours.max(1));
            let tenant_slug = tenant_slug.as_ref().map(String::as_str).filter(|slug| !slug.is_empty());
            let candidates = repo
                .candidates(archive_type, &cutoff, tenant_slug, false)
                .map_err(ectx!(convert => archive_type, cutoff, tenant_slug))?;
            Ok(candidates.len() as i64)
        })
    }

    fn export_archive(&self, filter: ArchiveFilter) -> ServiceFuture<Vec<ArchiveEntry>> {
        debug!("Exporting archive with {:?}", filter);
        let repo_factory = self.static_context.repo_factory.clone();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_archive_repo_with_sys_acl(&conn);
            repo.list(&filter, None).map_err(ectx!(convert => filter))
        })
    }

    fn archive_metrics(&self, filter: ArchiveFilter) -> ServiceFuture<ArchiveMetrics> {
        debug!("Computing archive metrics with {:?}", filter);
        let repo_factory = self.static_context.repo_factory.clone();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_archive_repo_with_sys_acl(&conn);
            let delivered = repo.totals(&filter, ArchiveType::Delivered).map_err(ectx!(convert => filter))?;
            let canceled = repo.totals(&filter, ArchiveType::Canceled).map_err(ectx!(convert => filter))?;
            let tip = ten_percent_tip(delivered.total);
            Ok(ArchiveMetrics {
                delivered_count: delivered.count,
                delivered_total: delivered.total,
                delivered_tip_10: tip,
                delivered_total_with_tip: delivered.total + tip,
                canceled_count: canceled.count,
                canceled_total: canceled.total,
            })
        })
    }

    fn archive_order(&self, order_id: Option<i32>, archive_type: String) -> ServiceFuture<ArchiveType> {
        debug!("Archiving order {:?} as {}", order_id, archive_type);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            let order_id = match order_id {
                Some(order_id) => OrderId::new(order_id),
                None => return fail(invalid("order_id", "order_id inválido")),
            };
            let archive_type: ArchiveType = match archive_type.parse() {
                Ok(archive_type) => archive_type,
                Err(_) => return fail(invalid("type", "type inválido")),
            };
            let orders_repo = repo_factory.create_orders_repo(&conn, identity.as_ref());
            let archive_repo = repo_factory.create_archive_repo(&conn, identity.as_ref());
            let order = match orders_repo.get(order_id).map_err(ectx!(convert => order_id))? {
                Some(order) => order,
                None => return fail(ErrorKind::NotFound("orden no encontrada".to_string())),
            };
            let created = archive_repo
                .create(order.id, &order.tenant_slug, archive_type, &now_iso())
                .map_err(ectx!(convert => order_id, archive_type))?;
            if created {
                info!("Order {} archived by hand as {}", order_id, archive_type);
            }
            Ok(archive_type)
        })
    }

    fn reset_tenant(&self, tenant_slug: String) -> ServiceFuture<usize> {
        debug!("Archiving every open order of {}", tenant_slug);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            if tenant_slug.is_empty() {
                return fail(invalid("tenant_slug", "tenant_slug requerido"));
            }
            let repo = repo_factory.create_archive_repo(&conn, identity.as_ref());
            let archived_at = now_iso();
            let count = conn.transaction::<_, Error, _>(|| {
                let pending = repo.unarchived(&tenant_slug).map_err(ectx!(convert => tenant_slug))?;
                for candidate in &pending {
                    repo.create(candidate.order_id, &tenant_slug, ArchiveType::Reset, &archived_at)
                        .map_err(ectx!(convert => tenant_slug, candidate.order_id))?;
                }
                Ok(pending.len())
            })?;
            info!("Reset archived {} orders of {}", count, tenant_slug);
            Ok(count)
        })
    }

    fn dashboard_metrics(&self, tenant_slug: String, from: Option<String>, to: Option<String>) -> ServiceFuture<DashboardMetrics> {
        debug!("Computing dashboard metrics of {} for {:?}..{:?}", tenant_slug, from, to);
        let repo_factory = self.static_context.repo_factory.clone();
        let from = from.filter(|d| !d.is_empty()).map(|d| expand_date_bound(&d, false));
        let to = to.filter(|d| !d.is_empty()).map(|d| expand_date_bound(&d, true));
        let slug = tenant_slug.clone();
        Box::new(
            self.spawn_on_pool(move |conn| {
                let orders_repo = repo_factory.create_orders_repo_with_sys_acl(&conn);
                let history_repo = repo_factory.create_order_history_repo_with_sys_acl(&conn);
                let from = from.as_ref().map(String::as_str);
                let to = to.as_ref().map(String::as_str);

                let active_count = orders_repo.count_active(&tenant_slug).map_err(ectx!(convert => tenant_slug))?;
                let delivered = orders_repo
                    .terminal_totals(&tenant_slug, OrderStatus::Entregado, from, to)
                    .map_err(ectx!(convert => tenant_slug, from, to))?;
                let canceled = orders_repo
                    .terminal_totals(&tenant_slug, OrderStatus::Cancelado, from, to)
                    .map_err(ectx!(convert => tenant_slug, from, to))?;
                let stages = history_repo
                    .stage_times(&tenant_slug, from, to)
                    .map_err(ectx!(convert => tenant_slug, from, to))?;
                let tip = ten_percent_tip(delivered.total);
                Ok(DashboardMetrics {
                    active_count,
                    delivered_count: delivered.count,
                    canceled_count: canceled.count,
                    delivered_total: delivered.total,
                    delivered_tip_10: tip,
                    delivered_total_with_tip: delivered.total + tip,
                    averages: StageAverages::compute(&stages),
                })
            })
            .or_else(move |e| {
                warn!("Dashboard metrics of {} failed, answering zeros: {}", slug, e);
                Ok::<_, Error>(DashboardMetrics::default())
            }),
        )
    }

    fn auto_archive(&self) -> ServiceFuture<SweepReport> {
        let repo_factory = self.static_context.repo_factory.clone();
        let threshold_hours = self.static_context.config.archive.threshold_hours;
        self.spawn_on_pool(move |conn| sweep(&*conn, &repo_factory, threshold_hours))
    }
}
