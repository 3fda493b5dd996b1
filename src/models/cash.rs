//! Cash register sessions, movements and the reconciliation arithmetic

use std::fmt;
use std::str::FromStr;

use diesel::sql_types::{BigInt, Integer, Nullable, Text};
use diesel::QueryableByName;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Entrada,
    Salida,
}

impl FromStr for MovementType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entrada" => Ok(MovementType::Entrada),
            "salida" => Ok(MovementType::Salida),
            _ => Err(()),
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MovementType::Entrada => write!(f, "entrada"),
            MovementType::Salida => write!(f, "salida"),
        }
    }
}

/// Drawer a tender ends up in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TenderBucket {
    Efectivo,
    Pos,
    Transferencia,
    Otros,
}

impl TenderBucket {
    /// Card terminals and QR codes count as `pos`; unknown or empty methods are cash
    pub fn classify(payment_method: &str) -> Self {
        let method = payment_method.trim().to_lowercase();
        if method.contains("pos") || method.contains("qr") || method.contains("tarjeta") {
            TenderBucket::Pos
        } else if method.contains("transferencia") {
            TenderBucket::Transferencia
        } else if method.contains("otros") {
            TenderBucket::Otros
        } else {
            TenderBucket::Efectivo
        }
    }
}

/// Theoretical amount per drawer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Breakdown {
    pub efectivo: i64,
    pub pos: i64,
    pub transferencia: i64,
    pub otros: i64,
}

impl Breakdown {
    fn bucket_mut(&mut self, bucket: TenderBucket) -> &mut i64 {
        match bucket {
            TenderBucket::Efectivo => &mut self.efectivo,
            TenderBucket::Pos => &mut self.pos,
            TenderBucket::Transferencia => &mut self.transferencia,
            TenderBucket::Otros => &mut self.otros,
        }
    }
}

#[derive(Clone, Debug, Serialize, QueryableByName)]
pub struct CashSession {
    #[diesel(sql_type = Integer)]
    pub id: i32,
    #[diesel(sql_type = Text)]
    pub tenant_slug: String,
    #[diesel(sql_type = Text)]
    pub opened_at: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub opened_by: Option<String>,
    #[diesel(sql_type = Integer)]
    pub opening_amount: i32,
    #[diesel(sql_type = Nullable<Text>)]
    pub notes_open: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub closed_at: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub closed_by: Option<String>,
    #[diesel(sql_type = Nullable<Integer>)]
    pub closing_amount: Option<i32>,
    #[diesel(sql_type = Nullable<Text>)]
    pub notes_close: Option<String>,
    #[diesel(sql_type = Nullable<Integer>)]
    pub closing_diff: Option<i32>,
    #[diesel(sql_type = Nullable<Text>)]
    pub closing_metadata: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewCashSession {
    pub tenant_slug: String,
    pub opened_at: String,
    pub opened_by: String,
    pub opening_amount: i32,
    pub notes_open: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CloseCashSession {
    pub closed_at: String,
    pub closed_by: String,
    pub closing_amount: i32,
    pub notes_close: String,
    pub closing_diff: i32,
    pub closing_metadata: Value,
}

#[derive(Clone, Debug, Serialize, QueryableByName)]
pub struct CashMovement {
    #[diesel(sql_type = Integer)]
    pub id: i32,
    #[diesel(sql_type = Integer)]
    pub session_id: i32,
    #[diesel(sql_type = Text)]
    #[serde(rename = "type")]
    pub movement_type: String,
    #[diesel(sql_type = Integer)]
    pub amount: i32,
    #[diesel(sql_type = Nullable<Text>)]
    pub note: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub actor: Option<String>,
    #[diesel(sql_type = Text)]
    pub created_at: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub payment_method: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewCashMovement {
    pub session_id: i32,
    pub movement_type: MovementType,
    pub amount: i32,
    pub note: String,
    pub actor: String,
    pub created_at: String,
    pub payment_method: String,
}

/// Sum of movements of one type and payment method
#[derive(Clone, Debug, PartialEq, QueryableByName)]
pub struct MovementTotal {
    #[diesel(sql_type = Text)]
    pub movement_type: String,
    #[diesel(sql_type = Nullable<Text>)]
    pub payment_method: Option<String>,
    #[diesel(sql_type = BigInt)]
    pub amount: i64,
}

/// Delivered orders attributed to a session window
#[derive(Clone, Copy, Debug, Default, PartialEq, QueryableByName)]
pub struct DeliveredTotals {
    #[diesel(sql_type = BigInt)]
    pub delivered_count: i64,
    #[diesel(sql_type = BigInt)]
    pub base_delivered_total: i64,
    #[diesel(sql_type = BigInt)]
    pub tip_total: i64,
    #[diesel(sql_type = BigInt)]
    pub shipping_total: i64,
}

#[derive(Clone, Debug, Serialize, QueryableByName)]
pub struct DeliveredOrder {
    #[diesel(sql_type = Integer)]
    pub id: i32,
    #[diesel(sql_type = Text)]
    pub created_at: String,
    #[diesel(sql_type = Integer)]
    pub total: i32,
    #[diesel(sql_type = Nullable<Text>)]
    pub payment_method: Option<String>,
}

/// Reconciliation of a session
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSummary {
    pub opening_amount: i64,
    pub delivered_count: i64,
    pub delivered_total: i64,
    pub base_delivered_total: i64,
    pub tip_total: i64,
    pub shipping_total: i64,
    pub entradas: i64,
    pub salidas: i64,
    pub theoretical_cash: i64,
    pub theoretical_breakdown: Breakdown,
}

impl SessionSummary {
    pub fn compute(opening_amount: i64, delivered: DeliveredTotals, movements: &[MovementTotal]) -> Self {
        let mut breakdown = Breakdown {
            efectivo: opening_amount,
            ..Breakdown::default()
        };
        let mut entradas = 0;
        let mut salidas = 0;
        for movement in movements {
            let bucket = TenderBucket::classify(movement.payment_method.as_ref().map(String::as_str).unwrap_or(""));
            match movement.movement_type.parse::<MovementType>() {
                Ok(MovementType::Entrada) => {
                    entradas += movement.amount;
                    *breakdown.bucket_mut(bucket) += movement.amount;
                }
                Ok(MovementType::Salida) => {
                    salidas += movement.amount;
                    *breakdown.bucket_mut(bucket) -= movement.amount;
                }
                Err(_) => {}
            }
        }
        Self {
            opening_amount,
            delivered_count: delivered.delivered_count,
            delivered_total: delivered.base_delivered_total + delivered.tip_total,
            base_delivered_total: delivered.base_delivered_total,
            tip_total: delivered.tip_total,
            shipping_total: delivered.shipping_total,
            entradas,
            salidas,
            theoretical_cash: opening_amount + entradas - salidas,
            theoretical_breakdown: breakdown,
        }
    }
}

/// Summary shown while the session is open
#[derive(Clone, Debug, Serialize)]
pub struct OpenSessionSummary {
    pub delivered_count: i64,
    pub delivered_total: i64,
    pub base_delivered_total: i64,
    pub tip_total: i64,
    pub shipping_total: i64,
    pub entradas: i64,
    pub salidas: i64,
    pub theoretical_cash: i64,
    pub theoretical_breakdown: Breakdown,
}

impl From<SessionSummary> for OpenSessionSummary {
    fn from(s: SessionSummary) -> Self {
        Self {
            delivered_count: s.delivered_count,
            delivered_total: s.delivered_total,
            base_delivered_total: s.base_delivered_total,
            tip_total: s.tip_total,
            shipping_total: s.shipping_total,
            entradas: s.entradas,
            salidas: s.salidas,
            theoretical_cash: s.theoretical_cash,
            theoretical_breakdown: s.theoretical_breakdown,
        }
    }
}

/// Summary returned when the session is closed
#[derive(Clone, Debug, Serialize)]
pub struct ClosingSummary {
    pub opening_amount: i64,
    pub entradas: i64,
    pub salidas: i64,
    pub delivered_total: i64,
    pub base_delivered_total: i64,
    pub tip_total: i64,
    pub shipping_total: i64,
    pub theoretical_cash: i64,
    pub closing_diff: i64,
    pub theoretical_breakdown: Breakdown,
    pub declared_breakdown: Value,
}

/// Filter of the closed session history
#[derive(Clone, Debug, PartialEq)]
pub struct SessionHistoryFilter {
    pub tenant_slug: String,
    pub by_opened_at: bool,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl SessionHistoryFilter {
    pub fn column(&self) -> &'static str {
        if self.by_opened_at {
            "opened_at"
        } else {
            "closed_at"
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct HistorySummary {
    #[serde(flatten)]
    pub totals: SessionSummary,
    pub closing_diff: i64,
}

/// Closed session with its reconciliation, as listed in the history
#[derive(Clone, Debug, Serialize)]
pub struct ClosedSessionReport {
    #[serde(flatten)]
    pub session: CashSession,
    pub summary: HistorySummary,
}

impl ClosedSessionReport {
    pub fn new(session: CashSession, totals: SessionSummary) -> Self {
        let closing_diff = session.closing_diff.unwrap_or(0) as i64;
        Self {
            session,
            summary: HistorySummary { totals, closing_diff },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(movement_type: &str, payment_method: Option<&str>, amount: i64) -> MovementTotal {
        MovementTotal {
            movement_type: movement_type.to_string(),
            payment_method: payment_method.map(String::from),
            amount,
        }
    }

    #[test]
    fn tenders_are_classified_by_substring() {
        assert_eq!(TenderBucket::classify("POS"), TenderBucket::Pos);
        assert_eq!(TenderBucket::classify(" qr mercado pago"), TenderBucket::Pos);
        assert_eq!(TenderBucket::classify("Tarjeta de crédito"), TenderBucket::Pos);
        assert_eq!(TenderBucket::classify("transferencia"), TenderBucket::Transferencia);
        assert_eq!(TenderBucket::classify("otros"), TenderBucket::Otros);
        assert_eq!(TenderBucket::classify("contado"), TenderBucket::Efectivo);
        assert_eq!(TenderBucket::classify(""), TenderBucket::Efectivo);
    }

    #[test]
    fn summary_reconciles_per_drawer() {
        let delivered = DeliveredTotals {
            delivered_count: 2,
            base_delivered_total: 3000,
            tip_total: 300,
            shipping_total: 200,
        };
        let movements = vec![
            total("entrada", Some("contado"), 1500),
            total("entrada", Some("pos"), 1800),
            total("entrada", None, 100),
            total("salida", Some("transferencia"), 250),
            total("salida", Some(""), 400),
        ];
        let summary = SessionSummary::compute(1000, delivered, &movements);
        assert_eq!(summary.entradas, 3400);
        assert_eq!(summary.salidas, 650);
        assert_eq!(summary.theoretical_cash, 1000 + 3400 - 650);
        assert_eq!(summary.delivered_total, 3300);
        assert_eq!(
            summary.theoretical_breakdown,
            Breakdown {
                efectivo: 1000 + 1500 + 100 - 400,
                pos: 1800,
                transferencia: -250,
                otros: 0,
            }
        );
    }

    #[test]
    fn empty_session_keeps_the_opening_amount_in_cash() {
        let summary = SessionSummary::compute(500, DeliveredTotals::default(), &[]);
        assert_eq!(summary.theoretical_cash, 500);
        assert_eq!(summary.theoretical_breakdown.efectivo, 500);
    }
}
