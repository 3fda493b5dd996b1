//! Orders service: storefront checkout, the order board and the admin actions on an order
use failure::Fail;
use serde_json::Value;

use super::error::{fail, invalid, invalid_with, narrow, out_of_range, Error, ErrorKind};
use super::tenants::cached_config;
use super::types::{ServiceFuture, ServiceResult};
use super::Service;
use crate::models::time::{now_iso, order_timestamp};
use crate::models::value::int_or;
use crate::models::*;
use crate::repos::repo_factory::ReposFactory;
use crate::repos::{CashSessionsRepo, OrdersRepo};

/// Stock given to products that a cart references before the catalog knows them
const AUTO_CREATED_STOCK: i32 = 1000;

/// Result of an admin edit of the items
#[derive(Clone, Debug, Serialize)]
pub struct EditedOrder {
    pub total: i64,
    pub items: Vec<EditedItem>,
}

pub trait OrdersService {
    /// Places a storefront order and takes its items out of stock
    fn create_order(&self, payload: CreateOrder) -> ServiceFuture<Order>;
    /// Page of the order board and the number of orders under the same filter
    fn list_orders(&self, filter: OrderFilter, limit: i64, offset: i64) -> ServiceFuture<(Vec<OrderListEntry>, i64)>;
    /// Every order under the filter, for the CSV export
    fn export_orders(&self, filter: OrderFilter) -> ServiceFuture<Vec<OrderListEntry>>;
    /// Full view for admins, reduced view for everybody else
    fn get_order(&self, order_id: OrderId) -> ServiceFuture<OrderView>;
    fn update_status(&self, order_id: OrderId, status: String, reason: String) -> ServiceFuture<Order>;
    /// Records the payment and its cash movements in the open session
    fn pay_order(&self, order_id: OrderId, payment: PayOrder) -> ServiceFuture<Order>;
    fn add_event(&self, order_id: OrderId, event: NewOrderEvent) -> ServiceFuture<()>;
    fn list_events(&self, order_id: OrderId) -> ServiceFuture<Vec<OrderEvent>>;
    /// Replaces the items of an order that is not finished yet
    fn edit_items(&self, order_id: OrderId, items: Vec<EditedItem>, order_notes: Option<String>) -> ServiceFuture<EditedOrder>;
}

fn order_not_found() -> ErrorKind {
    ErrorKind::NotFound("Orden no encontrada".to_string())
}

fn existing_order(repo: &dyn OrdersRepo, order_id: OrderId) -> ServiceResult<Order> {
    match repo.get(order_id).map_err(ectx!(convert => order_id))? {
        Some(order) => Ok(order),
        None => fail(order_not_found()),
    }
}

fn open_session(repo: &dyn CashSessionsRepo, tenant_slug: &str) -> ServiceResult<CashSession> {
    match repo.get_open(tenant_slug).map_err(ectx!(convert => tenant_slug))? {
        Some(session) => Ok(session),
        None => fail(invalid("session", "no hay sesión de caja abierta")),
    }
}

impl<F: ReposFactory> OrdersService for Service<F> {
    fn create_order(&self, payload: CreateOrder) -> ServiceFuture<Order> {
        debug!("Creating order for tenant {}", payload.tenant_slug);
        let repo_factory = self.static_context.repo_factory.clone();
        let cache = self.static_context.tenant_cache.clone();
        self.spawn_on_pool(move |conn| {
            let config_repo = repo_factory.create_tenant_config_repo_with_sys_acl(&conn);
            let orders_repo = repo_factory.create_orders_repo_with_sys_acl(&conn);
            let items_repo = repo_factory.create_order_items_repo_with_sys_acl(&conn);
            let products_repo = repo_factory.create_products_repo_with_sys_acl(&conn);

            let shipping_cost = if payload.order_type == OrderType::Direccion {
                let config = cached_config(&cache, &*config_repo, &payload.tenant_slug)?;
                int_or(config.get("shipping_cost"), 0)
            } else {
                0
            };
            let total = match cart_total(&payload.items).and_then(|cart| cart.checked_add(shipping_cost)) {
                Some(total) => narrow("total", total)?,
                None => return fail(out_of_range("total", None)),
            };
            let shipping_cost = narrow("shipping_cost", shipping_cost)?;
            let tenant_slug = payload.tenant_slug.clone();

            let order = conn.transaction::<_, Error, _>(|| {
                let order = orders_repo
                    .create(NewOrder {
                        tenant_slug: tenant_slug.clone(),
                        customer_name: payload.customer_name.clone(),
                        customer_phone: payload.customer_phone.clone(),
                        order_type: payload.order_type,
                        table_number: payload.table_number.clone(),
                        address_json: payload.address_json.clone(),
                        total,
                        created_at: order_timestamp(),
                        order_notes: payload.order_notes.clone(),
                        shipping_cost,
                    })
                    .map_err(ectx!(convert => tenant_slug))?;

                for item in &payload.items {
                    if let Some(ref product_id) = item.product_id {
                        let stock = match products_repo
                            .stock_level(&tenant_slug, product_id)
                            .map_err(ectx!(convert => tenant_slug, product_id))?
                        {
                            Some(level) => level.stock as i64,
                            None => {
                                products_repo
                                    .create_if_missing(NewProduct {
                                        tenant_slug: tenant_slug.clone(),
                                        product_id: product_id.clone(),
                                        name: item.product_name(),
                                        price: narrow("price", item.unit_price().max(0))?,
                                        stock: AUTO_CREATED_STOCK,
                                        details: String::new(),
                                        variants_json: "{}".to_string(),
                                        image_url: String::new(),
                                        last_modified: now_iso(),
                                    })
                                    .map_err(ectx!(convert => tenant_slug, product_id))?;
                                AUTO_CREATED_STOCK as i64
                            }
                        };
                        if stock < item.qty {
                            return fail(invalid_with(
                                "stock",
                                "stock insuficiente",
                                &[
                                    ("product_id", json!(product_id)),
                                    ("stock", json!(stock)),
                                    ("requested", json!(item.qty)),
                                ],
                            ));
                        }
                    }

                    let qty = narrow("qty", item.qty)?;
                    items_repo
                        .create(NewOrderItem {
                            order_id: order.id(),
                            tenant_slug: tenant_slug.clone(),
                            product_id: item.product_id.clone(),
                            name: item.name.clone(),
                            qty,
                            unit_price: narrow("price", item.unit_price())?,
                            modifiers_json: item.modifiers.to_string(),
                            notes: item.notes.clone(),
                        })
                        .map_err(ectx!(convert => tenant_slug))?;

                    if let Some(ref product_id) = item.product_id {
                        products_repo
                            .decrement_stock(&tenant_slug, product_id, qty)
                            .map_err(ectx!(convert => tenant_slug, product_id))?;
                    }
                }
                Ok(order)
            })?;

            info!("Order {} created for {} with total {}", order.id, order.tenant_slug, order.total);
            Ok(order)
        })
    }

    fn list_orders(&self, filter: OrderFilter, limit: i64, offset: i64) -> ServiceFuture<(Vec<OrderListEntry>, i64)> {
        debug!("Listing orders with {:?}, limit {}, offset {}", filter, limit, offset);
        let repo_factory = self.static_context.repo_factory.clone();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_orders_repo_with_sys_acl(&conn);
            let orders = repo.list(&filter, Some((limit, offset))).map_err(ectx!(convert => filter))?;
            let total = repo.count(&filter).map_err(ectx!(convert => filter))?;
            Ok((orders, total))
        })
    }

    fn export_orders(&self, filter: OrderFilter) -> ServiceFuture<Vec<OrderListEntry>> {
        debug!("Exporting orders with {:?}", filter);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_orders_repo(&conn, identity.as_ref());
            repo.list(&filter, None).map_err(ectx!(convert => filter))
        })
    }

    fn get_order(&self, order_id: OrderId) -> ServiceFuture<OrderView> {
        debug!("Reading order {}", order_id);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            let orders_repo = repo_factory.create_orders_repo(&conn, identity.as_ref());
            let items_repo = repo_factory.create_order_items_repo(&conn, identity.as_ref());
            let order = existing_order(&*orders_repo, order_id)?;
            let items = items_repo.list(order_id).map_err(ectx!(convert => order_id))?;
            if identity.is_none() {
                return Ok(OrderView::Public(PublicOrderDetail {
                    order: order.into(),
                    items,
                }));
            }
            let history_repo = repo_factory.create_order_history_repo(&conn, identity.as_ref());
            let events_repo = repo_factory.create_order_events_repo(&conn, identity.as_ref());
            let history = history_repo.list(order_id).map_err(ectx!(convert => order_id))?;
            let events = events_repo.list(order_id).map_err(ectx!(convert => order_id))?;
            Ok(OrderView::Full(OrderDetail {
                order,
                items,
                history,
                events,
            }))
        })
    }

    fn update_status(&self, order_id: OrderId, status: String, reason: String) -> ServiceFuture<Order> {
        debug!("Moving order {} to {}", order_id, status);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        let actor = self.actor();
        self.spawn_on_pool(move |conn| {
            let next: OrderStatus = match status.parse() {
                Ok(next) => next,
                Err(_) => return fail(invalid("status", "status inválido")),
            };
            let orders_repo = repo_factory.create_orders_repo(&conn, identity.as_ref());
            let history_repo = repo_factory.create_order_history_repo(&conn, identity.as_ref());
            let events_repo = repo_factory.create_order_events_repo(&conn, identity.as_ref());
            let sessions_repo = repo_factory.create_cash_sessions_repo(&conn, identity.as_ref());

            let order = existing_order(&*orders_repo, order_id)?;
            if !order.status().can_become(next) {
                return fail(invalid(
                    "status",
                    "no se puede cambiar el estado de una orden entregada. Utilice la función de anulación/reembolso si es necesario.",
                ));
            }
            if next == OrderStatus::Entregado {
                open_session(&*sessions_repo, &order.tenant_slug)?;
            }

            let reason = reason.trim().to_string();
            let canceled_with_reason = next == OrderStatus::Cancelado && !reason.is_empty();
            let notes = if canceled_with_reason {
                Some(format!(
                    "{} [Cancelado: {}]",
                    order.order_notes.clone().unwrap_or_default(),
                    reason
                ))
            } else {
                None
            };

            let updated = conn.transaction::<_, Error, _>(|| {
                let updated = orders_repo.update_status(order_id, next, notes).map_err(ectx!(convert => order_id, next))?;
                history_repo
                    .create(&order.tenant_slug, order_id, next, &now_iso(), &actor)
                    .map_err(ectx!(convert => order_id, next))?;
                let event = if next == OrderStatus::Cancelado {
                    let meta = if canceled_with_reason { json!({ "reason": reason }) } else { json!({}) };
                    NewOrderEvent::new(order_id, "canceled", &actor, meta)
                } else {
                    NewOrderEvent::new(order_id, "status_change", &actor, json!({}))
                };
                events_repo.create(&order.tenant_slug, event).map_err(ectx!(convert => order_id))?;
                Ok(updated)
            })?;

            info!("Order {} moved from {} to {} by {}", order_id, order.status, next, actor);
            Ok(updated)
        })
    }

    fn pay_order(&self, order_id: OrderId, payment: PayOrder) -> ServiceFuture<Order> {
        debug!("Paying order {} with {}", order_id, payment.method);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        let actor = self.actor();
        self.spawn_on_pool(move |conn| {
            let orders_repo = repo_factory.create_orders_repo(&conn, identity.as_ref());
            let events_repo = repo_factory.create_order_events_repo(&conn, identity.as_ref());
            let sessions_repo = repo_factory.create_cash_sessions_repo(&conn, identity.as_ref());
            let movements_repo = repo_factory.create_cash_movements_repo(&conn, identity.as_ref());

            let order = existing_order(&*orders_repo, order_id)?;
            if order.is_paid() {
                return fail(invalid("payment_status", "orden ya pagada"));
            }
            let session = open_session(&*sessions_repo, &order.tenant_slug)?;
            let tenders = match payment.tenders(i64::from(order.total)) {
                Ok(tenders) => tenders,
                Err(errors) => return fail(ErrorKind::Validation(errors)),
            };

            let tip_amount = narrow("tip_amount", payment.tip_amount)?;

            let paid = conn.transaction::<_, Error, _>(|| {
                let paid = orders_repo
                    .mark_paid(order_id, payment.method, tip_amount)
                    .map_err(ectx!(convert => order_id))?;
                let details = if payment.method == PaymentMethod::Mixed {
                    Value::Array(payment.details.clone())
                } else {
                    Value::Null
                };
                let event = NewOrderEvent::new(
                    order_id,
                    "payment",
                    &actor,
                    json!({
                        "method": payment.method,
                        "amount": order.total,
                        "tip": payment.tip_amount,
                        "details": details,
                    }),
                );
                events_repo.create(&order.tenant_slug, event).map_err(ectx!(convert => order_id))?;

                let created_at = now_iso();
                for tender in &tenders {
                    movements_repo
                        .create(
                            &order.tenant_slug,
                            NewCashMovement {
                                session_id: session.id,
                                movement_type: MovementType::Entrada,
                                amount: narrow("amount", tender.amount)?,
                                note: payment.movement_note(order_id, &order.order_type, tender),
                                actor: actor.clone(),
                                created_at: created_at.clone(),
                                payment_method: tender.method.clone(),
                            },
                        )
                        .map_err(ectx!(convert => order_id, session.id))?;
                }
                Ok(paid)
            })?;

            info!(
                "Order {} paid with {} ({} tenders) in session {}",
                order_id,
                payment.method,
                tenders.len(),
                session.id
            );
            Ok(paid)
        })
    }

    fn add_event(&self, order_id: OrderId, event: NewOrderEvent) -> ServiceFuture<()> {
        debug!("Adding {} event to order {}", event.event_type, order_id);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            if event.event_type.is_empty() {
                return fail(invalid("type", "tipo de evento requerido"));
            }
            let orders_repo = repo_factory.create_orders_repo(&conn, identity.as_ref());
            let events_repo = repo_factory.create_order_events_repo(&conn, identity.as_ref());
            let order = existing_order(&*orders_repo, order_id)?;
            events_repo.create(&order.tenant_slug, event).map_err(ectx!(convert => order_id))?;
            Ok(())
        })
    }

    fn list_events(&self, order_id: OrderId) -> ServiceFuture<Vec<OrderEvent>> {
        debug!("Listing events of order {}", order_id);
        let repo_factory = self.static_context.repo_factory.clone();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_order_events_repo_with_sys_acl(&conn);
            repo.list(order_id).map_err(ectx!(convert => order_id))
        })
    }

    fn edit_items(&self, order_id: OrderId, items: Vec<EditedItem>, order_notes: Option<String>) -> ServiceFuture<EditedOrder> {
        debug!("Editing items of order {}", order_id);
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        let actor = self.actor();
        self.spawn_on_pool(move |conn| {
            let orders_repo = repo_factory.create_orders_repo(&conn, identity.as_ref());
            let items_repo = repo_factory.create_order_items_repo(&conn, identity.as_ref());
            let events_repo = repo_factory.create_order_events_repo(&conn, identity.as_ref());

            let order = existing_order(&*orders_repo, order_id)?;
            if order.status().is_terminal() {
                return fail(invalid("status", "no se puede editar una orden finalizada"));
            }
            for item in &items {
                narrow("qty", item.qty)?;
                narrow("price", item.price)?;
            }
            let total = items
                .iter()
                .try_fold(0i64, |total, item| item.price.checked_mul(item.qty).and_then(|line| total.checked_add(line)));
            let total = match total {
                Some(total) => narrow("total", total)?,
                None => return fail(out_of_range("total", None)),
            };
            let keep: Vec<i32> = items.iter().filter_map(|item| item.item_id).collect();
            let tenant_slug = order.tenant_slug.clone();

            conn.transaction::<_, Error, _>(|| {
                items_repo
                    .delete_except(&tenant_slug, order_id, &keep)
                    .map_err(ectx!(convert => order_id, keep))?;
                for item in &items {
                    match item.item_id {
                        Some(item_id) => items_repo
                            .update(&tenant_slug, order_id, item_id, narrow("qty", item.qty)?, &item.notes)
                            .map_err(ectx!(convert => order_id, item_id))?,
                        None => {
                            items_repo
                                .create(NewOrderItem {
                                    order_id,
                                    tenant_slug: tenant_slug.clone(),
                                    product_id: item.product_id.clone(),
                                    name: item.name.clone(),
                                    qty: narrow("qty", item.qty)?,
                                    unit_price: narrow("price", item.price)?,
                                    modifiers_json: "{}".to_string(),
                                    notes: item.notes.clone(),
                                })
                                .map_err(ectx!(convert => order_id))?;
                        }
                    }
                }
                orders_repo
                    .update_total_and_notes(order_id, total, order_notes.clone())
                    .map_err(ectx!(convert => order_id))?;
                let actor = if actor.is_empty() { "admin" } else { actor.as_str() };
                let event = NewOrderEvent::new(
                    order_id,
                    "order_updated",
                    actor,
                    json!({"new_total": total, "items_count": items.len()}),
                );
                events_repo.create(&tenant_slug, event).map_err(ectx!(convert => order_id))?;
                Ok(())
            })?;

            info!("Order {} edited, {} items, new total {}", order_id, items.len(), total);
            Ok(EditedOrder {
                total: i64::from(total),
                items,
            })
        })
    }
}
