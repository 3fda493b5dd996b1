use futures::Future;

use gastro_lib::models::{ArchiveFilter, ArchiveType, PayOrder};
use gastro_lib::repos::repo_factory::ReposFactoryImpl;
use gastro_lib::services::archive::{sweep, ArchiveService};
use gastro_lib::services::cash::CashService;
use gastro_lib::services::orders::OrdersService;
use gastro_lib::services::ErrorKind;

use crate::common::{assert_invalid, TestApp, TENANT};

/// One paid delivery, one unpaid delivery, one cancellation and one pending order
fn finished_orders(app: &TestApp) -> Vec<i32> {
    let admin = app.admin();
    admin.open_session(TENANT.to_string(), 0, String::new()).wait().unwrap();

    let paid = app.place_pizzas(1);
    let payment = PayOrder::from_payload(&json!({"payment_method": "contado"})).unwrap();
    admin.pay_order(paid.id(), payment).wait().unwrap();
    admin.update_status(paid.id(), "entregado".to_string(), String::new()).wait().unwrap();

    let unpaid = app.place_pizzas(2);
    admin.update_status(unpaid.id(), "entregado".to_string(), String::new()).wait().unwrap();

    let canceled = app.place_pizzas(3);
    admin.update_status(canceled.id(), "cancelado".to_string(), String::new()).wait().unwrap();

    let pending = app.place_pizzas(4);
    vec![paid.id, unpaid.id, canceled.id, pending.id]
}

fn filter(archive_type: Option<&str>) -> ArchiveFilter {
    ArchiveFilter::new(TENANT.to_string(), archive_type.map(String::from), None, None, None, None, None)
}

#[test]
fn sweep_archives_paid_deliveries_and_cancellations_once() {
    let app = TestApp::new();
    let ids = finished_orders(&app);
    let conn = app.conn();

    let report = sweep(&*conn, &ReposFactoryImpl::new(), 0).unwrap();
    assert_eq!((report.delivered, report.canceled), (1, 1));
    let again = sweep(&*conn, &ReposFactoryImpl::new(), 0).unwrap();
    assert_eq!((again.delivered, again.canceled), (0, 0));

    let (delivered, total) = app.admin().list_archive(filter(Some("delivered")), 50, 0).wait().unwrap();
    assert_eq!(total, 1);
    assert_eq!(delivered[0].id, ids[0]);
    assert_eq!(delivered[0].payment_status, Some("paid".to_string()));

    let metrics = app.admin().archive_metrics(filter(None)).wait().unwrap();
    assert_eq!(metrics.delivered_count, 1);
    assert_eq!(metrics.delivered_total, 1000);
    assert_eq!(metrics.delivered_tip_10, 100);
    assert_eq!(metrics.delivered_total_with_tip, 1100);
    assert_eq!(metrics.canceled_count, 1);
    assert_eq!(metrics.canceled_total, 3000);
}

#[test]
fn scheduled_sweep_uses_the_configured_threshold() {
    let app = TestApp::new();
    finished_orders(&app);
    let report = app.admin().auto_archive().wait().unwrap();
    assert_eq!((report.delivered, report.canceled), (1, 1));
}

#[test]
fn eligibility_looks_back_at_least_an_hour() {
    let app = TestApp::new();
    finished_orders(&app);
    let admin = app.admin();
    assert_eq!(admin.eligible_count("delivered".to_string(), 0, None).wait().unwrap(), 0);
    assert_invalid(admin.eligible_count("reset".to_string(), 24, None).wait());
    assert_invalid(admin.eligible_count("lost".to_string(), 24, None).wait());
}

#[test]
fn manual_archive_is_idempotent() {
    let app = TestApp::new();
    let admin = app.admin();
    let order = app.place_pizzas(1);

    assert_eq!(admin.archive_order(Some(order.id), "canceled".to_string()).wait().unwrap(), ArchiveType::Canceled);
    admin.archive_order(Some(order.id), "canceled".to_string()).wait().unwrap();
    let (_, total) = admin.list_archive(filter(Some("canceled")), 50, 0).wait().unwrap();
    assert_eq!(total, 1);

    assert_invalid(admin.archive_order(None, "canceled".to_string()).wait());
    assert_invalid(admin.archive_order(Some(order.id), "perdido".to_string()).wait());
    match admin.archive_order(Some(order.id + 50), "canceled".to_string()).wait().map_err(|e| e.kind()) {
        Err(ErrorKind::NotFound(_)) => {}
        other => panic!("expected not found, got {:?}", other),
    }
}

#[test]
fn reset_archives_everything_left_and_clears_the_board() {
    let app = TestApp::new();
    let admin = app.admin();
    app.place_pizzas(1);
    app.place_pizzas(1);

    let before = admin.dashboard_metrics(TENANT.to_string(), None, None).wait().unwrap();
    assert_eq!(before.active_count, 2);

    assert_eq!(admin.reset_tenant(TENANT.to_string()).wait().unwrap(), 2);
    assert_eq!(admin.reset_tenant(TENANT.to_string()).wait().unwrap(), 0);
    assert_invalid(admin.reset_tenant(String::new()).wait());

    let after = admin.dashboard_metrics(TENANT.to_string(), None, None).wait().unwrap();
    assert_eq!(after.active_count, 0);
}

#[test]
fn dashboard_counts_terminal_orders() {
    let app = TestApp::new();
    finished_orders(&app);
    let metrics = app.admin().dashboard_metrics(TENANT.to_string(), None, None).wait().unwrap();
    assert_eq!(metrics.active_count, 1);
    assert_eq!(metrics.delivered_count, 2);
    assert_eq!(metrics.delivered_total, 3000);
    assert_eq!(metrics.delivered_tip_10, 300);
    assert_eq!(metrics.canceled_count, 1);
}
