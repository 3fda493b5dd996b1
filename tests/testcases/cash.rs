use futures::Future;

use gastro_lib::models::{PayOrder, SessionHistoryFilter};
use gastro_lib::services::cash::CashService;
use gastro_lib::services::orders::OrdersService;

use crate::common::{assert_invalid, TestApp, TENANT};

#[test]
fn one_open_session_per_tenant() {
    let app = TestApp::new();
    let admin = app.admin();
    assert!(admin.current_session(TENANT.to_string()).wait().unwrap().is_none());

    let session = admin.open_session(TENANT.to_string(), 1500, " cambio ".to_string()).wait().unwrap();
    assert_eq!(session.opening_amount, 1500);
    assert_eq!(session.notes_open, Some("cambio".to_string()));
    assert_eq!(session.opened_by, Some("admin".to_string()));
    assert_invalid(admin.open_session(TENANT.to_string(), 0, String::new()).wait());

    let (current, summary) = admin.current_session(TENANT.to_string()).wait().unwrap().unwrap();
    assert_eq!(current.id, session.id);
    assert_eq!(summary.theoretical_cash, 1500);
}

#[test]
fn movements_need_an_open_session_and_a_positive_amount() {
    let app = TestApp::new();
    let admin = app.admin();
    let add = |kind: &str, amount: i64| {
        admin
            .add_movement(TENANT.to_string(), kind.to_string(), amount, "hielo".to_string(), String::new())
            .wait()
    };

    assert_invalid(add("salida", 100));
    admin.open_session(TENANT.to_string(), 0, String::new()).wait().unwrap();
    assert_invalid(add("retiro", 100));
    assert_invalid(add("salida", 0));

    let movement = add(" SALIDA ", 100).unwrap();
    assert_eq!(movement.movement_type, "salida");
    assert_eq!(movement.note, Some("hielo".to_string()));

    let listed = admin
        .list_movements(TENANT.to_string(), movement.session_id, None, None)
        .wait()
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert!(admin.list_movements(TENANT.to_string(), 0, None, None).wait().unwrap().is_empty());
}

#[test]
fn closing_reconciles_payments_movements_and_deliveries() {
    let app = TestApp::new();
    let admin = app.admin();
    let session = admin.open_session(TENANT.to_string(), 1000, String::new()).wait().unwrap();

    let order = app.place_pizzas(2);
    let payment = PayOrder::from_payload(&json!({
        "payment_method": "mixed",
        "tip_amount": 200,
        "details": [{"method": "contado", "amount": 1200}, {"method": "pos", "amount": 1000}]
    }))
    .unwrap();
    admin.pay_order(order.id(), payment).wait().unwrap();
    admin
        .add_movement(TENANT.to_string(), "salida".to_string(), 300, "hielo".to_string(), String::new())
        .wait()
        .unwrap();
    admin.update_status(order.id(), "entregado".to_string(), String::new()).wait().unwrap();

    let (_, summary) = admin.current_session(TENANT.to_string()).wait().unwrap().unwrap();
    assert_eq!(summary.delivered_count, 1);
    assert_eq!(summary.base_delivered_total, 2000);
    assert_eq!(summary.tip_total, 200);
    assert_eq!(summary.delivered_total, 2200);
    assert_eq!(summary.entradas, 2200);
    assert_eq!(summary.salidas, 300);
    assert_eq!(summary.theoretical_cash, 2900);
    assert_eq!(summary.theoretical_breakdown.efectivo, 1900);
    assert_eq!(summary.theoretical_breakdown.pos, 1000);

    let orders = admin.session_orders(TENANT.to_string(), 0, None).wait().unwrap().unwrap();
    assert_eq!(orders.session_id, session.id);
    assert_eq!(orders.orders.len(), 1);
    assert_eq!(orders.orders[0].payment_method, Some("mixed".to_string()));

    let (closed, closing) = admin
        .close_session(TENANT.to_string(), 2850, "falta cambio".to_string(), json!({"efectivo": 1850, "pos": 1000}))
        .wait()
        .unwrap();
    assert_eq!(closing.theoretical_cash, 2900);
    assert_eq!(closing.closing_diff, -50);
    assert_eq!(closed.closing_diff, Some(-50));
    assert!(closed.closed_at.is_some());
    assert!(closed.closing_metadata.unwrap().contains("declared_breakdown"));
    assert!(admin.current_session(TENANT.to_string()).wait().unwrap().is_none());
    assert_invalid(
        admin
            .close_session(TENANT.to_string(), 0, String::new(), json!({}))
            .wait(),
    );

    let filter = SessionHistoryFilter {
        tenant_slug: TENANT.to_string(),
        by_opened_at: false,
        from: None,
        to: None,
    };
    let history = admin.session_history(filter, Some((10, 0))).wait().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].summary.closing_diff, -50);
    assert_eq!(history[0].summary.totals.entradas, 2200);
}

#[test]
fn mixed_payment_that_does_not_add_up_writes_nothing() {
    let app = TestApp::new();
    let admin = app.admin();
    let session = admin.open_session(TENANT.to_string(), 0, String::new()).wait().unwrap();
    let order = app.place_pizzas(1);
    let payment = PayOrder::from_payload(&json!({
        "payment_method": "mixed",
        "details": [{"method": "contado", "amount": 400}, {"method": "pos", "amount": 400}]
    }))
    .unwrap();

    assert_invalid(admin.pay_order(order.id(), payment).wait());
    let movements = admin.list_movements(TENANT.to_string(), session.id, None, None).wait().unwrap();
    assert!(movements.is_empty());
}

#[test]
fn unknown_session_has_no_orders() {
    let app = TestApp::new();
    assert!(app.admin().session_orders(TENANT.to_string(), 42, None).wait().unwrap().is_none());
}
