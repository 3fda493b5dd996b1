//! CSV exports of orders, archived orders and closed cash sessions

use crate::models::{ten_percent_tip, ArchiveEntry, ClosedSessionReport, OrderListEntry};

/// Rows separated by CRLF; fields with commas, quotes or line breaks are quoted
#[derive(Default)]
pub struct CsvWriter {
    out: String,
}

impl CsvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row<S: AsRef<str>>(&mut self, fields: &[S]) {
        let line = fields.iter().map(|field| escape(field.as_ref())).collect::<Vec<_>>().join(",");
        self.out.push_str(&line);
        self.out.push_str("\r\n");
    }

    pub fn finish(self) -> String {
        self.out
    }
}

fn escape(field: &str) -> String {
    if field.contains(|c: char| c == ',' || c == '"' || c == '\n' || c == '\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn number(value: Option<i32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn orders_csv(orders: &[OrderListEntry]) -> String {
    let mut writer = CsvWriter::new();
    writer.row(&[
        "id",
        "created_at",
        "order_type",
        "destination",
        "customer_phone",
        "total",
        "tip_10_percent",
        "total_with_tip",
        "status",
    ]);
    for order in orders {
        let total = order.total as i64;
        let tip = ten_percent_tip(total);
        writer.row(&[
            order.id.to_string(),
            order.created_at.clone(),
            order.order_type.clone(),
            order.destination(),
            text(&order.customer_phone),
            total.to_string(),
            tip.to_string(),
            (total + tip).to_string(),
            order.status.clone(),
        ]);
    }
    writer.finish()
}

pub fn archive_csv(entries: &[ArchiveEntry]) -> String {
    let mut writer = CsvWriter::new();
    writer.row(&[
        "id",
        "created_at",
        "order_type",
        "destination",
        "customer_phone",
        "total",
        "status",
        "archived_at",
        "customer_name",
        "last_status",
        "last_change",
        "payment_status",
    ]);
    for entry in entries {
        writer.row(&[
            entry.id.to_string(),
            entry.created_at.clone(),
            entry.order_type.clone(),
            entry.destination(),
            text(&entry.customer_phone),
            entry.total.to_string(),
            entry.status.clone(),
            entry.archived_at.clone(),
            text(&entry.customer_name),
            text(&entry.last_status),
            text(&entry.last_change),
            text(&entry.payment_status),
        ]);
    }
    writer.finish()
}

pub fn sessions_csv(reports: &[ClosedSessionReport]) -> String {
    let mut writer = CsvWriter::new();
    writer.row(&[
        "tenant_slug",
        "opened_at",
        "opened_by",
        "opening_amount",
        "notes_open",
        "closed_at",
        "closed_by",
        "closing_amount",
        "notes_close",
        "base_delivered_total",
        "tip_total",
        "shipping_total",
        "delivered_total",
        "entradas",
        "salidas",
        "theoretical_cash",
        "closing_diff",
    ]);
    for report in reports {
        let session = &report.session;
        let totals = &report.summary.totals;
        writer.row(&[
            session.tenant_slug.clone(),
            session.opened_at.clone(),
            text(&session.opened_by),
            session.opening_amount.to_string(),
            text(&session.notes_open),
            text(&session.closed_at),
            text(&session.closed_by),
            number(session.closing_amount),
            text(&session.notes_close),
            totals.base_delivered_total.to_string(),
            totals.tip_total.to_string(),
            totals.shipping_total.to_string(),
            totals.delivered_total.to_string(),
            totals.entradas.to_string(),
            totals.salidas.to_string(),
            totals.theoretical_cash.to_string(),
            report.summary.closing_diff.to_string(),
        ]);
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_with_separators_are_quoted() {
        let mut writer = CsvWriter::new();
        writer.row(&["a", "b,c", "say \"hi\"", "x\ny"]);
        assert_eq!(writer.finish(), "a,\"b,c\",\"say \"\"hi\"\"\",\"x\ny\"\r\n");
    }

    #[test]
    fn order_rows_carry_rounded_tip() {
        let order = OrderListEntry {
            id: 3,
            tenant_slug: "t".to_string(),
            order_type: "mesa".to_string(),
            table_number: Some("12".to_string()),
            address_json: None,
            status: "entregado".to_string(),
            total: 1995,
            created_at: "2024-01-01T10:00:00Z".to_string(),
            customer_phone: None,
            customer_name: None,
            payment_status: None,
            payment_method: None,
            tip_amount: None,
            shipping_cost: None,
        };
        let csv = orders_csv(&[order]);
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines[1], "3,2024-01-01T10:00:00Z,mesa,12,,1995,200,2195,entregado");
    }
}
