use std::panic::{self, AssertUnwindSafe};

use futures::Future;

use gastro_lib::db::Param;
use gastro_lib::models::{CreateOrder, EditedItem, OrderFilter, OrderId, OrderView, PayOrder};
use gastro_lib::services::cash::CashService;
use gastro_lib::services::orders::OrdersService;
use gastro_lib::services::products::ProductsService;
use gastro_lib::services::Error as ServiceError;

use crate::common::{assert_forbidden, assert_invalid, TestApp, TENANT};

fn stock_of(app: &TestApp, product_id: &str) -> i32 {
    app.guest()
        .list_products(TENANT.to_string(), true)
        .wait()
        .unwrap()
        .into_iter()
        .find(|product| product.id == product_id)
        .map(|product| product.stock)
        .unwrap()
}

#[test]
fn delivery_order_takes_stock_and_charges_shipping() {
    let app = TestApp::new();
    let order = app.place(json!({
        "order_type": "direccion",
        "address": {"street": "Mitre", "number": "10"},
        "customer_name": "Ana",
        "items": [
            {"id": "p1", "name": "Pizza", "price": 1000, "quantity": 2},
            {"id": "p9", "name": "Flan", "price": 500}
        ]
    }));

    assert_eq!(order.status, "pendiente");
    assert_eq!(order.total, 2000 + 500 + 300);
    assert_eq!(order.shipping_cost, Some(300));
    assert!(order.created_at.ends_with('Z'));
    assert_eq!(stock_of(&app, "p1"), 48);
    assert_eq!(stock_of(&app, "p9"), 999);
}

#[test]
fn missing_stock_rejects_the_whole_order() {
    let app = TestApp::new();
    assert_invalid(
        app.guest()
            .create_order(
                gastro_lib::models::CreateOrder::from_payload(
                    &json!({
                        "table_number": "2",
                        "items": [
                            {"id": "p2", "name": "Empanada", "price": 250, "qty": 3},
                            {"id": "p1", "name": "Pizza", "price": 1000, "qty": 60}
                        ]
                    }),
                    TENANT,
                )
                .unwrap(),
            )
            .wait(),
    );

    let filter = OrderFilter {
        tenant_slug: TENANT.to_string(),
        ..OrderFilter::default()
    };
    let (orders, total) = app.guest().list_orders(filter, 50, 0).wait().unwrap();
    assert!(orders.is_empty());
    assert_eq!(total, 0);
    assert_eq!(stock_of(&app, "p2"), 50);
}

#[test]
fn delivery_needs_an_open_drawer_and_is_final() {
    let app = TestApp::new();
    let admin = app.admin();
    let order = app.place_pizzas(1);

    admin.update_status(order.id(), "preparacion".to_string(), String::new()).wait().unwrap();
    assert_invalid(admin.update_status(order.id(), "entregado".to_string(), String::new()).wait());

    admin.open_session(TENANT.to_string(), 1000, String::new()).wait().unwrap();
    let delivered = admin.update_status(order.id(), "entregado".to_string(), String::new()).wait().unwrap();
    assert_eq!(delivered.status, "entregado");
    assert_invalid(admin.update_status(order.id(), "listo".to_string(), String::new()).wait());
    assert_invalid(admin.update_status(order.id(), "volando".to_string(), String::new()).wait());

    match admin.get_order(order.id()).wait().unwrap() {
        OrderView::Full(detail) => {
            let statuses: Vec<&str> = detail.history.iter().map(|change| change.status.as_str()).collect();
            assert_eq!(statuses, vec!["preparacion", "entregado"]);
            assert_eq!(detail.history[0].changed_by, Some("admin".to_string()));
            assert_eq!(detail.events.len(), 2);
        }
        other => panic!("expected the admin view, got {:?}", other),
    }
}

#[test]
fn cancel_reason_lands_in_notes_and_event() {
    let app = TestApp::new();
    let order = app.place(json!({
        "table_number": "7",
        "order_notes": "sin sal",
        "items": [{"id": "p2", "name": "Empanada", "price": 250}]
    }));

    let canceled = app
        .admin()
        .update_status(order.id(), "cancelado".to_string(), " cliente se fue ".to_string())
        .wait()
        .unwrap();
    assert_eq!(canceled.order_notes, Some("sin sal [Cancelado: cliente se fue]".to_string()));

    let events = app.admin().list_events(order.id()).wait().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "canceled");
    assert!(events[0].payload_json.as_ref().unwrap().contains("cliente se fue"));
}

#[test]
fn guests_get_the_reduced_view() {
    let app = TestApp::new();
    let order = app.place_pizzas(2);

    match app.guest().get_order(order.id()).wait().unwrap() {
        OrderView::Public(detail) => {
            assert_eq!(detail.order.total, 2000);
            assert_eq!(detail.items.len(), 1);
            assert_eq!(detail.items[0].qty, 2);
        }
        other => panic!("expected the public view, got {:?}", other),
    }
    assert!(app.guest().get_order(OrderId::new(order.id + 100)).wait().is_err());
}

#[test]
fn admins_cannot_touch_other_tenants() {
    let app = TestApp::new();
    let order = app.place_pizzas(1);
    assert_forbidden(app.admin_of("local2").update_status(order.id(), "listo".to_string(), String::new()).wait());
}

#[test]
fn item_edit_replaces_lines_and_total() {
    let app = TestApp::new();
    let admin = app.admin();
    let order = app.place(json!({
        "table_number": "3",
        "items": [
            {"id": "p1", "name": "Pizza", "price": 1000, "qty": 2},
            {"id": "p2", "name": "Empanada", "price": 250, "qty": 4}
        ]
    }));
    let pizza_line = match admin.get_order(order.id()).wait().unwrap() {
        OrderView::Full(detail) => detail.items.iter().find(|item| item.name == "Pizza").map(|item| item.id).unwrap(),
        other => panic!("expected the admin view, got {:?}", other),
    };

    let items: Vec<EditedItem> = vec![
        json!({"item_id": pizza_line, "name": "Pizza", "price": 1000, "qty": 1, "notes": "bien cocida"}),
        json!({"id": "p3", "name": "Agua", "price": 150, "qty": 2}),
    ]
    .iter()
    .filter_map(EditedItem::from_value)
    .collect();
    let edited = admin.edit_items(order.id(), items, Some("mesa junta".to_string())).wait().unwrap();
    assert_eq!(edited.total, 1300);

    match admin.get_order(order.id()).wait().unwrap() {
        OrderView::Full(detail) => {
            assert_eq!(detail.order.total, 1300);
            assert_eq!(detail.order.order_notes, Some("mesa junta".to_string()));
            assert_eq!(detail.items.len(), 2);
            let pizza = detail.items.iter().find(|item| item.id == pizza_line).unwrap();
            assert_eq!(pizza.qty, 1);
            assert_eq!(pizza.notes, Some("bien cocida".to_string()));
            assert_eq!(detail.events.last().map(|e| e.event_type.as_str()), Some("order_updated"));
        }
        other => panic!("expected the admin view, got {:?}", other),
    }
}

#[test]
fn finished_orders_cannot_be_edited() {
    let app = TestApp::new();
    let admin = app.admin();
    let order = app.place_pizzas(1);
    admin.update_status(order.id(), "cancelado".to_string(), String::new()).wait().unwrap();
    let items = vec![EditedItem::from_value(&json!({"id": "p1", "price": 1000, "qty": 1})).unwrap()];
    assert_invalid(admin.edit_items(order.id(), items, None).wait());
}

#[test]
fn board_pages_and_counts_under_the_filter() {
    let app = TestApp::new();
    let first = app.place_pizzas(1);
    app.place_pizzas(2);
    app.place_pizzas(3);

    let filter = OrderFilter {
        tenant_slug: TENANT.to_string(),
        ..OrderFilter::default()
    };
    let (page, total) = app.guest().list_orders(filter.clone(), 2, 0).wait().unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(total, 3);

    let by_id = OrderFilter {
        q: Some(first.id.to_string()),
        ..filter
    };
    let (page, total) = app.guest().list_orders(by_id, 50, 0).wait().unwrap();
    assert_eq!(total, 1);
    assert_eq!(page[0].id, first.id);
}

#[test]
fn orders_are_paid_once() {
    let app = TestApp::new();
    let admin = app.admin();
    let order = app.place_pizzas(1);
    let payment = PayOrder::from_payload(&json!({"payment_method": "pos", "tip_amount": 100})).unwrap();

    assert_invalid(admin.pay_order(order.id(), payment.clone()).wait());

    admin.open_session(TENANT.to_string(), 0, String::new()).wait().unwrap();
    let paid = admin.pay_order(order.id(), payment.clone()).wait().unwrap();
    assert_eq!(paid.payment_status, Some("paid".to_string()));
    assert_eq!(paid.tip_amount, Some(100));
    assert_invalid(admin.pay_order(order.id(), payment).wait());
}

#[test]
fn storefront_amounts_beyond_the_columns_are_rejected() {
    let app = TestApp::new();
    let too_expensive = json!({"table_number": "4", "items": [{"name": "Banquete", "price": 3_000_000_000i64, "qty": 1}]});
    assert!(CreateOrder::from_payload(&too_expensive, TENANT).is_err());
    let overflowing = json!({"table_number": "4", "items": [{"name": "Banquete", "price": i64::max_value(), "qty": 2}]});
    assert!(CreateOrder::from_payload(&overflowing, TENANT).is_err());

    let mut order = CreateOrder::from_payload(
        &json!({"table_number": "4", "items": [{"id": "p1", "name": "Pizza", "price": 1000, "qty": 1}]}),
        TENANT,
    )
    .unwrap();
    order.items[0].price = Some(i64::max_value());
    order.items[0].qty = 2;
    assert_invalid(app.guest().create_order(order.clone()).wait());
    order.items[0].price = Some(3_000_000_000);
    order.items[0].qty = 1;
    assert_invalid(app.guest().create_order(order).wait());

    let filter = OrderFilter {
        tenant_slug: TENANT.to_string(),
        ..OrderFilter::default()
    };
    let (_, total) = app.guest().list_orders(filter, 10, 0).wait().unwrap();
    assert_eq!(total, 0);
    assert_eq!(stock_of(&app, "p1"), 50);
}

#[test]
fn item_edit_rejects_totals_beyond_the_columns() {
    let app = TestApp::new();
    let admin = app.admin();
    let order = app.place_pizzas(1);

    let wide = vec![EditedItem::from_value(&json!({"id": "p1", "price": 3_000_000_000i64, "qty": 1})).unwrap()];
    assert_invalid(admin.edit_items(order.id(), wide, None).wait());
    let overflowing = vec![EditedItem::from_value(&json!({"id": "p1", "price": i64::max_value(), "qty": 2})).unwrap()];
    assert_invalid(admin.edit_items(order.id(), overflowing, None).wait());
    let summed = vec![
        EditedItem::from_value(&json!({"id": "p1", "price": 2_000_000_000i64, "qty": 1})).unwrap(),
        EditedItem::from_value(&json!({"id": "p2", "price": 2_000_000_000i64, "qty": 1})).unwrap(),
    ];
    assert_invalid(admin.edit_items(order.id(), summed, None).wait());

    match admin.get_order(order.id()).wait().unwrap() {
        OrderView::Full(detail) => {
            assert_eq!(detail.order.total, 1000);
            assert_eq!(detail.items.len(), 1);
        }
        other => panic!("expected the admin view, got {:?}", other),
    }
}

#[test]
fn abandoned_transaction_does_not_lock_out_checkout() {
    let app = TestApp::new();
    {
        let conn = app.conn();
        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            let _: Result<(), ServiceError> = conn.transaction(|| {
                conn.execute("UPDATE products SET stock = 0 WHERE tenant_slug = ?", &[Param::from(TENANT)])?;
                panic!("worker died mid transaction");
            });
        }));
        assert!(unwound.is_err());
        assert!(!conn.is_broken());
    }

    app.place_pizzas(2);
    assert_eq!(stock_of(&app, "p1"), 48);
}
