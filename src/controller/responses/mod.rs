//! Bodies answered by the controller that do not map one to one to a model

use serde_json::Value;

use crate::models::{
    ArchiveEntry, CashMovement, CashSession, ClosedSessionReport, ClosingSummary, EditedItem, OpenSessionSummary, Order,
    OrderListEntry, ProductView,
};

#[derive(Debug, Serialize)]
pub struct CreatedOrderResponse {
    pub order_id: i32,
    pub status: String,
    pub total: i32,
    pub tenant_slug: String,
}

impl From<Order> for CreatedOrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            status: order.status,
            total: order.total,
            tenant_slug: order.tenant_slug,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrdersPageResponse {
    pub count: usize,
    pub orders: Vec<OrderListEntry>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub order_id: i32,
    pub payment_status: String,
    pub payment_method: String,
    pub tip_amount: i32,
}

impl From<Order> for PaymentResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            payment_status: order.payment_status.unwrap_or_default(),
            payment_method: order.payment_method.unwrap_or_default(),
            tip_amount: order.tip_amount.unwrap_or(0),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EditedOrderResponse {
    pub ok: bool,
    pub order_id: i32,
    pub total: i64,
    pub items: Vec<EditedItem>,
}

/// `GET /api/cash/session`
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CashSessionResponse {
    Inactive {
        active: bool,
    },
    Active {
        active: bool,
        session: CashSession,
        summary: OpenSessionSummary,
    },
}

impl From<Option<(CashSession, OpenSessionSummary)>> for CashSessionResponse {
    fn from(current: Option<(CashSession, OpenSessionSummary)>) -> Self {
        match current {
            Some((session, summary)) => CashSessionResponse::Active {
                active: true,
                session,
                summary,
            },
            None => CashSessionResponse::Inactive { active: false },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OpenedSessionResponse {
    pub session_id: i32,
    pub tenant_slug: String,
    pub opened_at: String,
    pub opening_amount: i32,
}

impl From<CashSession> for OpenedSessionResponse {
    fn from(session: CashSession) -> Self {
        Self {
            session_id: session.id,
            tenant_slug: session.tenant_slug,
            opened_at: session.opened_at,
            opening_amount: session.opening_amount,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClosedSessionResponse {
    pub session_id: i32,
    pub tenant_slug: String,
    pub opened_at: String,
    pub closed_at: Option<String>,
    pub closing_amount: Option<i32>,
    pub summary: ClosingSummary,
}

impl From<(CashSession, ClosingSummary)> for ClosedSessionResponse {
    fn from((session, summary): (CashSession, ClosingSummary)) -> Self {
        Self {
            session_id: session.id,
            tenant_slug: session.tenant_slug,
            opened_at: session.opened_at,
            closed_at: session.closed_at,
            closing_amount: session.closing_amount,
            summary,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovementsResponse {
    pub tenant_slug: String,
    pub session_id: i32,
    pub movements: Vec<CashMovement>,
}

#[derive(Debug, Serialize)]
pub struct MovementResponse {
    pub session_id: i32,
    #[serde(rename = "type")]
    pub movement_type: String,
    pub amount: i32,
    pub note: String,
    pub created_at: String,
}

impl From<CashMovement> for MovementResponse {
    fn from(movement: CashMovement) -> Self {
        Self {
            session_id: movement.session_id,
            movement_type: movement.movement_type,
            amount: movement.amount,
            note: movement.note.unwrap_or_default(),
            created_at: movement.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionsPageResponse {
    pub sessions: Vec<ClosedSessionReport>,
    pub limit: i64,
    pub offset: i64,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ArchivePageResponse {
    pub archives: Vec<ArchiveEntry>,
    pub count: usize,
    pub limit: i64,
    pub offset: i64,
    pub total_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub products: Vec<ProductView>,
    pub tenant_slug: String,
}

/// `{"ok": true, "tenant_slug": ...}` followed by the fields of `body`
pub fn with_ok_and_tenant(tenant_slug: &str, body: Value) -> Value {
    let mut object = json!({"ok": true, "tenant_slug": tenant_slug});
    if let (Some(target), Value::Object(fields)) = (object.as_object_mut(), body) {
        target.extend(fields);
    }
    object
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_drawer_is_just_inactive() {
        let body = serde_json::to_value(CashSessionResponse::from(None)).unwrap();
        assert_eq!(body, json!({"active": false}));
    }

    #[test]
    fn echoed_fields_follow_ok() {
        let body = with_ok_and_tenant("local1", json!({"warning_minutes": 10}));
        assert_eq!(body, json!({"ok": true, "tenant_slug": "local1", "warning_minutes": 10}));
    }
}
