//! Cash register sessions: opening, movements, reconciliation and closing
use failure::Fail;
use serde_json::Value;

use super::error::{fail, invalid, narrow, out_of_range, Error, ErrorKind};
use super::types::{ServiceFuture, ServiceResult};
use super::Service;
use crate::models::time::now_iso;
use crate::models::*;
use crate::repos::repo_factory::ReposFactory;
use crate::repos::{CashMovementsRepo, OrdersRepo};

/// Delivered orders attributed to a session window
#[derive(Clone, Debug, Serialize)]
pub struct SessionOrders {
    pub orders: Vec<DeliveredOrder>,
    pub session_id: i32,
    pub from: String,
    pub to: String,
}

pub trait CashService {
    /// Open session of the tenant with its running reconciliation
    fn current_session(&self, tenant_slug: String) -> ServiceFuture<Option<(CashSession, OpenSessionSummary)>>;
    fn open_session(&self, tenant_slug: String, opening_amount: i64, notes: String) -> ServiceFuture<CashSession>;
    /// Closes the open session against the amount counted in the drawer
    fn close_session(&self, tenant_slug: String, closing_amount: i64, notes: String, declared_breakdown: Value) -> ServiceFuture<(CashSession, ClosingSummary)>;
    /// Movements of one session, or of every session of the tenant inside a date range
    fn list_movements(&self, tenant_slug: String, session_id: i32, from: Option<String>, to: Option<String>) -> ServiceFuture<Vec<CashMovement>>;
    fn add_movement(&self, tenant_slug: String, movement_type: String, amount: i64, note: String, payment_method: String) -> ServiceFuture<CashMovement>;
    /// Delivered orders of a session, `None` when there is no such session
    fn session_orders(&self, tenant_slug: String, session_id: i32, to: Option<String>) -> ServiceFuture<Option<SessionOrders>>;
    /// Closed sessions with their reconciliation; `paging` is `(limit, offset)`
    fn session_history(&self, filter: SessionHistoryFilter, paging: Option<(i64, i64)>) -> ServiceFuture<Vec<ClosedSessionReport>>;
}

/// Reconciliation of `session` for the window `[opened_at, to]`
fn summarize(orders_repo: &dyn OrdersRepo, movements_repo: &dyn CashMovementsRepo, session: &CashSession, to: &str) -> ServiceResult<SessionSummary> {
    let delivered = orders_repo
        .delivered_totals(&session.tenant_slug, &session.opened_at, Some(to))
        .map_err(ectx!(convert => session.id))?;
    let movements = movements_repo.totals(session.id).map_err(ectx!(convert => session.id))?;
    Ok(SessionSummary::compute(i64::from(session.opening_amount), delivered, &movements))
}

fn no_open_session() -> ErrorKind {
    invalid("session", "no hay sesión de caja abierta")
}

impl<F: ReposFactory> CashService for Service<F> {
    fn current_session(&self, tenant_slug: String) -> ServiceFuture<Option<(CashSession, OpenSessionSummary)>> {
        debug!("Reading open cash session of {}", tenant_slug);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            let sessions_repo = repo_factory.create_cash_sessions_repo(&conn, identity.as_ref());
            let orders_repo = repo_factory.create_orders_repo(&conn, identity.as_ref());
            let movements_repo = repo_factory.create_cash_movements_repo(&conn, identity.as_ref());
            let session = match sessions_repo.get_open(&tenant_slug).map_err(ectx!(convert => tenant_slug))? {
                Some(session) => session,
                None => return Ok(None),
            };
            let summary = summarize(&*orders_repo, &*movements_repo, &session, &now_iso())?;
            Ok(Some((session, summary.into())))
        })
    }

    fn open_session(&self, tenant_slug: String, opening_amount: i64, notes: String) -> ServiceFuture<CashSession> {
        debug!("Opening cash session of {} with {}", tenant_slug, opening_amount);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        let actor = self.actor();
        self.spawn_on_pool(move |conn| {
            let opening_amount = narrow("opening_amount", opening_amount)?;
            let repo = repo_factory.create_cash_sessions_repo(&conn, identity.as_ref());
            conn.transaction::<_, Error, _>(|| {
                if repo.get_open(&tenant_slug).map_err(ectx!(convert => tenant_slug))?.is_some() {
                    return fail(invalid("session", "ya existe una sesión de caja abierta"));
                }
                let session = repo
                    .create(NewCashSession {
                        tenant_slug: tenant_slug.clone(),
                        opened_at: now_iso(),
                        opened_by: actor.clone(),
                        opening_amount,
                        notes_open: notes.trim().to_string(),
                    })
                    .map_err(ectx!(convert => tenant_slug))?;
                info!("Cash session {} opened for {} by {}", session.id, tenant_slug, actor);
                Ok(session)
            })
        })
    }

    fn close_session(&self, tenant_slug: String, closing_amount: i64, notes: String, declared_breakdown: Value) -> ServiceFuture<(CashSession, ClosingSummary)> {
        debug!("Closing cash session of {} with {}", tenant_slug, closing_amount);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        let actor = self.actor();
        self.spawn_on_pool(move |conn| {
            let closing_column = narrow("closing_amount", closing_amount)?;
            let sessions_repo = repo_factory.create_cash_sessions_repo(&conn, identity.as_ref());
            let orders_repo = repo_factory.create_orders_repo(&conn, identity.as_ref());
            let movements_repo = repo_factory.create_cash_movements_repo(&conn, identity.as_ref());
            conn.transaction::<_, Error, _>(|| {
                let session = match sessions_repo.get_open(&tenant_slug).map_err(ectx!(convert => tenant_slug))? {
                    Some(session) => session,
                    None => return fail(no_open_session()),
                };
                let closed_at = now_iso();
                let totals = summarize(&*orders_repo, &*movements_repo, &session, &closed_at)?;
                let closing_diff = match closing_amount.checked_sub(totals.theoretical_cash) {
                    Some(diff) => diff,
                    None => return fail(out_of_range("closing_amount", Some(closing_amount))),
                };
                let diff_column = narrow("closing_amount", closing_diff)?;
                let closed = sessions_repo
                    .close(
                        session.id,
                        CloseCashSession {
                            closed_at,
                            closed_by: actor.clone(),
                            closing_amount: closing_column,
                            notes_close: notes.trim().to_string(),
                            closing_diff: diff_column,
                            closing_metadata: json!({ "declared_breakdown": declared_breakdown.clone() }),
                        },
                    )
                    .map_err(ectx!(convert => session.id))?;
                info!(
                    "Cash session {} of {} closed by {}, declared {}, theoretical {}, diff {}",
                    closed.id, tenant_slug, actor, closing_amount, totals.theoretical_cash, closing_diff
                );
                let summary = ClosingSummary {
                    opening_amount: totals.opening_amount,
                    entradas: totals.entradas,
                    salidas: totals.salidas,
                    delivered_total: totals.delivered_total,
                    base_delivered_total: totals.base_delivered_total,
                    tip_total: totals.tip_total,
                    shipping_total: totals.shipping_total,
                    theoretical_cash: totals.theoretical_cash,
                    closing_diff,
                    theoretical_breakdown: totals.theoretical_breakdown,
                    declared_breakdown: declared_breakdown.clone(),
                };
                Ok((closed, summary))
            })
        })
    }

    fn list_movements(&self, tenant_slug: String, session_id: i32, from: Option<String>, to: Option<String>) -> ServiceFuture<Vec<CashMovement>> {
        debug!("Listing cash movements of {} (session {}, {:?}..{:?})", tenant_slug, session_id, from, to);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_cash_movements_repo(&conn, identity.as_ref());
            if session_id > 0 {
                repo.list_by_session(session_id).map_err(ectx!(convert => session_id))
            } else if from.is_some() || to.is_some() {
                repo.list_by_range(&tenant_slug, from.as_ref().map(String::as_str), to.as_ref().map(String::as_str))
                    .map_err(ectx!(convert => tenant_slug, from, to))
            } else {
                Ok(vec![])
            }
        })
    }

    fn add_movement(&self, tenant_slug: String, movement_type: String, amount: i64, note: String, payment_method: String) -> ServiceFuture<CashMovement> {
        debug!("Adding {} of {} to the cash session of {}", movement_type, amount, tenant_slug);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        let actor = self.actor();
        self.spawn_on_pool(move |conn| {
            let movement_type: MovementType = match movement_type.trim().to_lowercase().parse() {
                Ok(movement_type) => movement_type,
                Err(_) => return fail(invalid("type", "tipo inválido")),
            };
            if amount <= 0 {
                return fail(invalid("amount", "monto inválido"));
            }
            let amount_column = narrow("amount", amount)?;
            let sessions_repo = repo_factory.create_cash_sessions_repo(&conn, identity.as_ref());
            let movements_repo = repo_factory.create_cash_movements_repo(&conn, identity.as_ref());
            let session = match sessions_repo.get_open(&tenant_slug).map_err(ectx!(convert => tenant_slug))? {
                Some(session) => session,
                None => return fail(no_open_session()),
            };
            let movement = movements_repo
                .create(
                    &tenant_slug,
                    NewCashMovement {
                        session_id: session.id,
                        movement_type,
                        amount: amount_column,
                        note: note.trim().to_string(),
                        actor,
                        created_at: now_iso(),
                        payment_method: payment_method.trim().to_string(),
                    },
                )
                .map_err(ectx!(convert => tenant_slug, session.id))?;
            info!("Cash {} of {} recorded in session {}", movement_type, amount, session.id);
            Ok(movement)
        })
    }

    fn session_orders(&self, tenant_slug: String, session_id: i32, to: Option<String>) -> ServiceFuture<Option<SessionOrders>> {
        debug!("Listing delivered orders of cash session {} of {}", session_id, tenant_slug);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            let sessions_repo = repo_factory.create_cash_sessions_repo(&conn, identity.as_ref());
            let orders_repo = repo_factory.create_orders_repo(&conn, identity.as_ref());
            let session = if session_id > 0 {
                sessions_repo.get(&tenant_slug, session_id).map_err(ectx!(convert => tenant_slug, session_id))?
            } else {
                sessions_repo.get_open(&tenant_slug).map_err(ectx!(convert => tenant_slug))?
            };
            let session = match session.filter(|session| !session.opened_at.is_empty()) {
                Some(session) => session,
                None => return Ok(None),
            };
            let end = to
                .filter(|to| !to.is_empty())
                .or_else(|| session.closed_at.clone().filter(|closed| !closed.is_empty()))
                .unwrap_or_else(now_iso);
            let orders = orders_repo
                .delivered_in_window(&tenant_slug, &session.opened_at, Some(&end))
                .map_err(ectx!(convert => tenant_slug, session.id))?;
            Ok(Some(SessionOrders {
                orders,
                session_id: session.id,
                from: session.opened_at,
                to: end,
            }))
        })
    }

    fn session_history(&self, filter: SessionHistoryFilter, paging: Option<(i64, i64)>) -> ServiceFuture<Vec<ClosedSessionReport>> {
        debug!("Listing closed cash sessions with {:?}", filter);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            let sessions_repo = repo_factory.create_cash_sessions_repo(&conn, identity.as_ref());
            let orders_repo = repo_factory.create_orders_repo(&conn, identity.as_ref());
            let movements_repo = repo_factory.create_cash_movements_repo(&conn, identity.as_ref());
            let sessions = sessions_repo.list_closed(&filter, paging).map_err(ectx!(convert => filter))?;
            sessions
                .into_iter()
                .map(|session| {
                    let to = session.closed_at.clone().unwrap_or_else(now_iso);
                    let totals = summarize(&*orders_repo, &*movements_repo, &session, &to)?;
                    Ok(ClosedSessionReport::new(session, totals))
                })
                .collect()
        })
    }
}
