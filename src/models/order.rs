//! Orders, their items and the rules for creating and moving them through statuses

use std::fmt;
use std::str::FromStr;

use derive_more::{Display, From, FromStr};
use diesel::sql_types::{Integer, Nullable, Text};
use diesel::QueryableByName;
use serde_json::Value;
use validator::{ValidationError, ValidationErrors};

use super::value::{first_of, int32_lenient, int_lenient, text_lenient};

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, From, FromStr, Hash, Serialize, Deserialize)]
pub struct OrderId(i32);

impl OrderId {
    pub fn new(id: i32) -> Self {
        OrderId(id)
    }

    pub fn inner(&self) -> i32 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Mesa,
    Direccion,
    Espera,
    None,
}

impl FromStr for OrderType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mesa" => Ok(OrderType::Mesa),
            "direccion" => Ok(OrderType::Direccion),
            "espera" => Ok(OrderType::Espera),
            "none" => Ok(OrderType::None),
            _ => Err(()),
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            OrderType::Mesa => write!(f, "mesa"),
            OrderType::Direccion => write!(f, "direccion"),
            OrderType::Espera => write!(f, "espera"),
            OrderType::None => write!(f, "none"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pendiente,
    Preparacion,
    Listo,
    EnCamino,
    Entregado,
    Cancelado,
}

impl OrderStatus {
    /// Delivered orders are final; anything else can move freely
    pub fn can_become(self, next: OrderStatus) -> bool {
        self != OrderStatus::Entregado || next == OrderStatus::Entregado
    }

    pub fn is_terminal(self) -> bool {
        self == OrderStatus::Entregado || self == OrderStatus::Cancelado
    }
}

impl FromStr for OrderStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendiente" => Ok(OrderStatus::Pendiente),
            "preparacion" => Ok(OrderStatus::Preparacion),
            "listo" => Ok(OrderStatus::Listo),
            "en_camino" => Ok(OrderStatus::EnCamino),
            "entregado" => Ok(OrderStatus::Entregado),
            "cancelado" => Ok(OrderStatus::Cancelado),
            _ => Err(()),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            OrderStatus::Pendiente => write!(f, "pendiente"),
            OrderStatus::Preparacion => write!(f, "preparacion"),
            OrderStatus::Listo => write!(f, "listo"),
            OrderStatus::EnCamino => write!(f, "en_camino"),
            OrderStatus::Entregado => write!(f, "entregado"),
            OrderStatus::Cancelado => write!(f, "cancelado"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Contado,
    Pos,
    Transferencia,
    Mixed,
}

impl FromStr for PaymentMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contado" => Ok(PaymentMethod::Contado),
            "pos" => Ok(PaymentMethod::Pos),
            "transferencia" => Ok(PaymentMethod::Transferencia),
            "mixed" => Ok(PaymentMethod::Mixed),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PaymentMethod::Contado => write!(f, "contado"),
            PaymentMethod::Pos => write!(f, "pos"),
            PaymentMethod::Transferencia => write!(f, "transferencia"),
            PaymentMethod::Mixed => write!(f, "mixed"),
        }
    }
}

pub const PAYMENT_STATUS_PAID: &str = "paid";

/// Suggested 10% tip, rounded half up
pub fn ten_percent_tip(total: i64) -> i64 {
    (total + 5) / 10
}

/// Full order row
#[derive(Clone, Debug, Serialize, QueryableByName)]
pub struct Order {
    #[diesel(sql_type = Integer)]
    pub id: i32,
    #[diesel(sql_type = Text)]
    pub tenant_slug: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub customer_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub customer_phone: Option<String>,
    #[diesel(sql_type = Text)]
    pub order_type: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub table_number: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub address_json: Option<String>,
    #[diesel(sql_type = Text)]
    pub status: String,
    #[diesel(sql_type = Integer)]
    pub total: i32,
    #[diesel(sql_type = Nullable<Text>)]
    pub payment_method: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub payment_status: Option<String>,
    #[diesel(sql_type = Text)]
    pub created_at: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub order_notes: Option<String>,
    #[diesel(sql_type = Nullable<Integer>)]
    pub tip_amount: Option<i32>,
    #[diesel(sql_type = Nullable<Integer>)]
    pub shipping_cost: Option<i32>,
}

impl Order {
    pub fn id(&self) -> OrderId {
        OrderId(self.id)
    }

    /// Unknown statuses written by older clients are treated as pending
    pub fn status(&self) -> OrderStatus {
        self.status.parse().unwrap_or(OrderStatus::Pendiente)
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status.as_ref().map(|s| s == PAYMENT_STATUS_PAID).unwrap_or(false)
    }

    /// Where the order goes: the table for dine-in, the address otherwise
    pub fn destination(&self) -> String {
        if self.order_type == "mesa" {
            self.table_number.clone().unwrap_or_default()
        } else {
            self.address_json.clone().unwrap_or_default()
        }
    }
}

/// What anonymous callers get to see of an order
#[derive(Clone, Debug, Serialize)]
pub struct PublicOrder {
    pub id: i32,
    pub tenant_slug: String,
    pub status: String,
    pub total: i32,
    pub created_at: String,
    pub order_type: String,
    pub table_number: Option<String>,
}

impl From<Order> for PublicOrder {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            tenant_slug: order.tenant_slug,
            status: order.status,
            total: order.total,
            created_at: order.created_at,
            order_type: order.order_type,
            table_number: order.table_number,
        }
    }
}

/// Row of the order board and the CSV export
#[derive(Clone, Debug, Serialize, QueryableByName)]
pub struct OrderListEntry {
    #[diesel(sql_type = Integer)]
    pub id: i32,
    #[diesel(sql_type = Text)]
    pub tenant_slug: String,
    #[diesel(sql_type = Text)]
    pub order_type: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub table_number: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub address_json: Option<String>,
    #[diesel(sql_type = Text)]
    pub status: String,
    #[diesel(sql_type = Integer)]
    pub total: i32,
    #[diesel(sql_type = Text)]
    pub created_at: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub customer_phone: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub customer_name: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub payment_status: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub payment_method: Option<String>,
    #[diesel(sql_type = Nullable<Integer>)]
    pub tip_amount: Option<i32>,
    #[diesel(sql_type = Nullable<Integer>)]
    pub shipping_cost: Option<i32>,
}

impl OrderListEntry {
    pub fn destination(&self) -> String {
        if self.order_type == "mesa" {
            self.table_number.clone().unwrap_or_default()
        } else {
            self.address_json.clone().unwrap_or_default()
        }
    }
}

/// Filters shared by the order board and its CSV export
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderFilter {
    pub tenant_slug: String,
    pub status: Option<String>,
    pub id: Option<i32>,
    pub q: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub exclude_archived: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewOrder {
    pub tenant_slug: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub order_type: OrderType,
    pub table_number: String,
    pub address_json: String,
    pub total: i32,
    pub created_at: String,
    pub order_notes: String,
    pub shipping_cost: i32,
}

/// One line of the storefront cart
#[derive(Clone, Debug, PartialEq)]
pub struct CartItem {
    pub product_id: Option<String>,
    pub name: String,
    pub price: Option<i64>,
    pub qty: i64,
    pub modifiers: Value,
    pub notes: String,
}

impl CartItem {
    pub fn from_value(item: &Value) -> Self {
        let qty = first_of(item, &["quantity", "qty"])
            .and_then(int_lenient)
            .filter(|q| *q != 0)
            .unwrap_or(1)
            .max(1);
        let modifiers = match item.get("modifiers") {
            Some(v) if !v.is_null() => v.clone(),
            _ => json!({}),
        };
        Self {
            product_id: Some(text_lenient(item.get("id"))).filter(|id| !id.is_empty()),
            name: text_lenient(item.get("name")),
            price: item.get("price").and_then(int_lenient),
            qty,
            modifiers,
            notes: text_lenient(item.get("notes")),
        }
    }

    pub fn unit_price(&self) -> i64 {
        self.price.unwrap_or(0)
    }

    /// Name used when the product has to be created on the fly
    pub fn product_name(&self) -> String {
        if self.name.is_empty() {
            "Producto".to_string()
        } else {
            self.name.clone()
        }
    }
}

/// Sum of price times quantity, lines without a readable price do not count.
/// `None` when the sum does not fit in an `i64`.
pub fn cart_total(items: &[CartItem]) -> Option<i64> {
    items.iter().try_fold(0i64, |total, item| match item.price {
        Some(price) => price.checked_mul(item.qty).and_then(|line| total.checked_add(line)),
        None => Some(total),
    })
}

fn fits_column(value: i64) -> bool {
    value >= i64::from(i32::min_value()) && value <= i64::from(i32::max_value())
}

/// Validated storefront order
#[derive(Clone, Debug, PartialEq)]
pub struct CreateOrder {
    pub tenant_slug: String,
    pub order_type: OrderType,
    pub table_number: String,
    pub address_json: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub order_notes: String,
    pub items: Vec<CartItem>,
}

fn validation_error(field: &'static str, code: &'static str, message: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    let mut error = ValidationError::new(code);
    error.message = Some(message.to_string().into());
    errors.add(field, error);
    errors
}

impl CreateOrder {
    pub fn from_payload(payload: &Value, default_slug: &str) -> Result<Self, ValidationErrors> {
        let tenant_slug = first_of(payload, &["tenant_slug", "slug"])
            .map(|v| text_lenient(Some(v)))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default_slug.to_string());
        let raw_type = text_lenient(payload.get("order_type")).to_lowercase();
        let raw_type = if raw_type.is_empty() { "mesa".to_string() } else { raw_type };
        let order_type: OrderType = raw_type
            .parse()
            .map_err(|_| validation_error("order_type", "invalid", "order_type inválido"))?;

        let table_number = text_lenient(payload.get("table_number"));
        let address_json = match payload.get("address") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Object(map)) if !map.is_empty() => Value::Object(map.clone()).to_string(),
            Some(Value::Array(list)) if !list.is_empty() => Value::Array(list.clone()).to_string(),
            _ => String::new(),
        };
        let customer_name = text_lenient(payload.get("customer_name"));
        let customer_phone = text_lenient(payload.get("customer_phone"));

        match order_type {
            OrderType::Mesa if table_number.is_empty() => {
                return Err(validation_error("table_number", "required", "Número de mesa requerido"))
            }
            OrderType::Direccion if address_json.is_empty() => {
                return Err(validation_error("address", "required", "Dirección requerida"))
            }
            OrderType::Espera if customer_name.is_empty() => {
                return Err(validation_error(
                    "customer_name",
                    "required",
                    "Nombre requerido para pedidos en espera",
                ))
            }
            OrderType::Espera if customer_phone.is_empty() => {
                return Err(validation_error(
                    "customer_phone",
                    "required",
                    "Teléfono requerido para pedidos en espera",
                ))
            }
            _ => {}
        }

        let items: Vec<CartItem> = payload
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(CartItem::from_value).collect())
            .unwrap_or_default();
        if items.is_empty() {
            return Err(validation_error("items", "required", "Carrito vacío"));
        }
        if items.iter().any(|item| !fits_column(item.unit_price()) || !fits_column(item.qty)) {
            return Err(validation_error("items", "range", "precio o cantidad fuera de rango"));
        }
        if !cart_total(&items).map_or(false, fits_column) {
            return Err(validation_error("total", "range", "total fuera de rango"));
        }

        Ok(Self {
            tenant_slug,
            order_type,
            table_number,
            address_json,
            customer_name,
            customer_phone,
            order_notes: text_lenient(payload.get("order_notes")),
            items,
        })
    }
}

#[derive(Clone, Debug, Serialize, QueryableByName)]
pub struct OrderItem {
    #[diesel(sql_type = Integer)]
    pub id: i32,
    #[diesel(sql_type = Nullable<Text>)]
    pub product_id: Option<String>,
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Integer)]
    pub qty: i32,
    #[diesel(sql_type = Integer)]
    pub unit_price: i32,
    #[diesel(sql_type = Nullable<Text>)]
    pub modifiers_json: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub tenant_slug: String,
    pub product_id: Option<String>,
    pub name: String,
    pub qty: i32,
    pub unit_price: i32,
    pub modifiers_json: String,
    pub notes: String,
}

/// Item of an admin edit; `item_id` points at an existing row
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EditedItem {
    pub product_id: Option<String>,
    pub item_id: Option<i32>,
    pub name: String,
    pub price: i64,
    pub qty: i64,
    pub notes: String,
}

impl EditedItem {
    /// Lines with a quantity of zero or less are dropped
    pub fn from_value(item: &Value) -> Option<Self> {
        let qty = first_of(item, &["quantity", "qty"]).and_then(int_lenient).unwrap_or(1);
        if qty <= 0 {
            return None;
        }
        let name = text_lenient(item.get("name"));
        Some(Self {
            product_id: first_of(item, &["product_id", "id"])
                .map(|v| text_lenient(Some(v)))
                .filter(|s| !s.is_empty()),
            item_id: item.get("item_id").and_then(int32_lenient),
            name: if name.is_empty() { "Producto".to_string() } else { name },
            price: item.get("price").and_then(int_lenient).unwrap_or(0),
            qty,
            notes: text_lenient(item.get("notes")),
        })
    }
}

#[derive(Clone, Debug, Serialize, QueryableByName)]
pub struct StatusChange {
    #[diesel(sql_type = Text)]
    pub status: String,
    #[diesel(sql_type = Text)]
    pub changed_at: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub changed_by: Option<String>,
}

/// Creation time of an order and the moment it reached some status
#[derive(Clone, Debug, QueryableByName)]
pub struct StatusReached {
    #[diesel(sql_type = Text)]
    pub created_at: String,
    #[diesel(sql_type = Text)]
    pub changed_at: String,
}

#[derive(Clone, Debug, Serialize, QueryableByName)]
pub struct OrderEvent {
    #[diesel(sql_type = Integer)]
    pub id: i32,
    #[diesel(sql_type = Text)]
    pub event_type: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub actor: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub terminal: Option<String>,
    #[diesel(sql_type = Nullable<Integer>)]
    pub amount_delta: Option<i32>,
    #[diesel(sql_type = Nullable<Text>)]
    pub payload_json: Option<String>,
    #[diesel(sql_type = Text)]
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewOrderEvent {
    pub order_id: OrderId,
    pub event_type: String,
    pub actor: String,
    pub terminal: String,
    pub amount_delta: i32,
    pub payload: Value,
}

impl NewOrderEvent {
    pub fn new(order_id: OrderId, event_type: &str, actor: &str, payload: Value) -> Self {
        Self {
            order_id,
            event_type: event_type.to_string(),
            actor: actor.to_string(),
            terminal: String::new(),
            amount_delta: 0,
            payload,
        }
    }
}

/// One tender of a payment
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Tender {
    pub method: String,
    pub amount: i64,
}

/// Validated payment request
#[derive(Clone, Debug, PartialEq)]
pub struct PayOrder {
    pub method: PaymentMethod,
    pub tip_amount: i64,
    /// Split of a `mixed` payment as sent by the client
    pub details: Vec<Value>,
}

impl PayOrder {
    pub fn from_payload(payload: &Value) -> Result<Self, ValidationErrors> {
        let method = text_lenient(payload.get("payment_method"));
        let details = payload.get("details").and_then(Value::as_array).cloned().unwrap_or_default();
        let method = match method.parse::<PaymentMethod>() {
            Ok(PaymentMethod::Mixed) if details.is_empty() => {
                return Err(validation_error("details", "required", "detalles de pago mixto requeridos"))
            }
            Ok(method) => method,
            Err(_) => return Err(validation_error("payment_method", "invalid", "método de pago inválido")),
        };
        Ok(Self {
            method,
            tip_amount: payload.get("tip_amount").and_then(int_lenient).unwrap_or(0),
            details,
        })
    }

    /// Cash register entries for an order of `total`. A mixed split must add up
    /// to the total plus tip; zero and negative parts are not registered.
    pub fn tenders(&self, total: i64) -> Result<Vec<Tender>, ValidationErrors> {
        let out_of_range = || validation_error("tip_amount", "range", "propina fuera de rango");
        let due = total.checked_add(self.tip_amount).filter(|due| fits_column(*due)).ok_or_else(out_of_range)?;
        if self.method != PaymentMethod::Mixed {
            return Ok(vec![Tender {
                method: self.method.to_string(),
                amount: due,
            }]);
        }
        let parts: Vec<Tender> = self
            .details
            .iter()
            .map(|detail| Tender {
                method: text_lenient(detail.get("method")),
                amount: detail.get("amount").and_then(int_lenient).unwrap_or(0),
            })
            .collect();
        if parts.iter().any(|part| !fits_column(part.amount)) {
            return Err(validation_error("details", "range", "monto fuera de rango"));
        }
        let sum: i64 = parts.iter().map(|part| part.amount).sum();
        if sum != due {
            return Err(validation_error(
                "details",
                "sum_mismatch",
                &format!("suma de pagos ({}) no coincide con total ({})", sum, due),
            ));
        }
        Ok(parts.into_iter().filter(|part| part.amount > 0).collect())
    }

    /// Note of the cash movement recording `tender`
    pub fn movement_note(&self, order_id: OrderId, order_type: &str, tender: &Tender) -> String {
        let mut note = format!("Cobro pedido #{} ({})", order_id, tender.method);
        if self.method != PaymentMethod::Mixed && self.tip_amount > 0 {
            note.push_str(&format!(" (incl. propina ${})", self.tip_amount));
        }
        let order_type = order_type.trim().to_lowercase();
        if order_type == "delivery" || order_type == "espera" {
            note.push_str(&format!(" [Auto-Cobro {}]", order_type));
        }
        note
    }
}

/// Admin detail view
#[derive(Clone, Debug, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub history: Vec<StatusChange>,
    pub events: Vec<OrderEvent>,
}

/// Public detail view
#[derive(Clone, Debug, Serialize)]
pub struct PublicOrderDetail {
    pub order: PublicOrder,
    pub items: Vec<OrderItem>,
}

/// What `GET /api/orders/{id}` answers, depending on who asks
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum OrderView {
    Full(OrderDetail),
    Public(PublicOrderDetail),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tip_rounds_half_up() {
        assert_eq!(ten_percent_tip(0), 0);
        assert_eq!(ten_percent_tip(1234), 123);
        assert_eq!(ten_percent_tip(1235), 124);
        assert_eq!(ten_percent_tip(95), 10);
    }

    #[test]
    fn delivered_orders_are_final() {
        assert!(!OrderStatus::Entregado.can_become(OrderStatus::Listo));
        assert!(!OrderStatus::Entregado.can_become(OrderStatus::Cancelado));
        assert!(OrderStatus::Entregado.can_become(OrderStatus::Entregado));
        assert!(OrderStatus::Cancelado.can_become(OrderStatus::Pendiente));
        assert!(OrderStatus::Listo.can_become(OrderStatus::Entregado));
    }

    #[test]
    fn statuses_round_trip_through_text() {
        for status in &["pendiente", "preparacion", "listo", "en_camino", "entregado", "cancelado"] {
            let parsed: OrderStatus = status.parse().unwrap();
            assert_eq!(parsed.to_string(), *status);
        }
        assert!("enviado".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn order_type_defaults_to_mesa_and_needs_a_table() {
        let err = CreateOrder::from_payload(&json!({"items": [{"id": "p1"}]}), "local").unwrap_err();
        assert!(err.field_errors().contains_key("table_number"));

        let order = CreateOrder::from_payload(&json!({"table_number": 4, "items": [{"id": "p1"}]}), "local").unwrap();
        assert_eq!(order.order_type, OrderType::Mesa);
        assert_eq!(order.table_number, "4");
        assert_eq!(order.tenant_slug, "local");
    }

    #[test]
    fn pickup_needs_name_and_phone() {
        let payload = json!({"order_type": "ESPERA", "customer_name": "Ana", "items": [{"id": "p1"}]});
        let err = CreateOrder::from_payload(&payload, "local").unwrap_err();
        assert!(err.field_errors().contains_key("customer_phone"));
    }

    #[test]
    fn unknown_type_and_empty_cart_are_rejected() {
        let err = CreateOrder::from_payload(&json!({"order_type": "drone"}), "local").unwrap_err();
        assert!(err.field_errors().contains_key("order_type"));
        let err = CreateOrder::from_payload(&json!({"order_type": "none", "items": []}), "local").unwrap_err();
        assert!(err.field_errors().contains_key("items"));
    }

    #[test]
    fn address_objects_are_stored_as_json() {
        let payload = json!({"order_type": "direccion", "address": {"street": "Mitre 10"}, "items": [{"id": "p"}]});
        let order = CreateOrder::from_payload(&payload, "local").unwrap();
        assert_eq!(order.address_json, r#"{"street":"Mitre 10"}"#);
        let err = CreateOrder::from_payload(&json!({"order_type": "direccion", "address": {}, "items": [{"id": "p"}]}), "local")
            .unwrap_err();
        assert!(err.field_errors().contains_key("address"));
    }

    #[test]
    fn cart_total_uses_quantity_then_qty() {
        let items: Vec<CartItem> = vec![
            json!({"id": "a", "price": 100, "quantity": 2}),
            json!({"id": "b", "price": "50", "qty": 3}),
            json!({"id": "c", "price": 10}),
            json!({"id": "d", "price": "gratis", "qty": 3}),
        ]
        .iter()
        .map(CartItem::from_value)
        .collect();
        assert_eq!(cart_total(&items), Some(200 + 150 + 10));
        assert_eq!(items[3].unit_price(), 0);
        assert_eq!(items[3].product_name(), "Producto");
    }

    #[test]
    fn cart_amounts_must_fit_the_columns() {
        let huge_price = json!({"table_number": 4, "items": [{"name": "Banquete", "price": 3_000_000_000i64, "qty": 1}]});
        let err = CreateOrder::from_payload(&huge_price, "local").unwrap_err();
        assert!(err.field_errors().contains_key("items"));

        let overflowing = json!({"table_number": 4, "items": [{"name": "Banquete", "price": i64::max_value(), "qty": 2}]});
        assert!(CreateOrder::from_payload(&overflowing, "local").is_err());

        let big_sum = json!({"table_number": 4, "items": [
            {"name": "a", "price": 2_000_000_000i64, "qty": 1},
            {"name": "b", "price": 2_000_000_000i64, "qty": 1}
        ]});
        let err = CreateOrder::from_payload(&big_sum, "local").unwrap_err();
        assert!(err.field_errors().contains_key("total"));

        let item = CartItem::from_value(&json!({"price": i64::max_value(), "qty": 2}));
        assert_eq!(cart_total(&[item]), None);
    }

    #[test]
    fn mixed_payment_must_add_up() {
        let pay = PayOrder::from_payload(&json!({
            "payment_method": "mixed",
            "tip_amount": 100,
            "details": [{"method": "contado", "amount": 600}, {"method": "pos", "amount": 500}, {"method": "qr", "amount": 0}]
        }))
        .unwrap();
        let tenders = pay.tenders(1000).unwrap();
        assert_eq!(tenders.len(), 2);
        assert_eq!(tenders[1], Tender { method: "pos".to_string(), amount: 500 });

        let err = pay.tenders(900).unwrap_err();
        assert!(err.field_errors().contains_key("details"));
    }

    #[test]
    fn single_tender_covers_total_and_tip() {
        let pay = PayOrder::from_payload(&json!({"payment_method": "pos", "tip_amount": "50"})).unwrap();
        assert_eq!(pay.tenders(1000).unwrap(), vec![Tender { method: "pos".to_string(), amount: 1050 }]);
        assert_eq!(
            pay.movement_note(OrderId::new(7), "espera", &pay.tenders(1000).unwrap()[0]),
            "Cobro pedido #7 (pos) (incl. propina $50) [Auto-Cobro espera]"
        );
        assert!(PayOrder::from_payload(&json!({"payment_method": "cheque"})).is_err());
        assert!(PayOrder::from_payload(&json!({"payment_method": "mixed"})).is_err());
    }

    #[test]
    fn edited_items_without_quantity_are_dropped() {
        assert_eq!(EditedItem::from_value(&json!({"item_id": 3, "qty": 0})), None);
        let item = EditedItem::from_value(&json!({"id": "p1", "qty": "2", "price": 30})).unwrap();
        assert_eq!(item.product_id, Some("p1".to_string()));
        assert_eq!(item.name, "Producto");
        assert_eq!(item.item_id, None);
    }
}
