use futures::Future;

use gastro_lib::models::{ProductUpdate, Sla, SlideUpdate, UpsertProduct};
use gastro_lib::repos::Upserted;
use gastro_lib::services::auth::AuthService;
use gastro_lib::services::carousel::CarouselService;
use gastro_lib::services::products::ProductsService;
use gastro_lib::services::tenants::TenantsService;
use gastro_lib::services::ErrorKind;

use crate::common::{assert_forbidden, assert_invalid, TestApp, TENANT};

#[test]
fn seeded_admins_can_log_in() {
    let app = TestApp::new();
    let guest = app.guest();

    let identity = guest
        .login(TENANT.to_string(), "admin".to_string(), "secreto".to_string())
        .wait()
        .unwrap();
    assert_eq!(identity.username, "admin");
    assert_eq!(identity.tenant_slug, Some(TENANT.to_string()));
    guest
        .login(TENANT.to_string(), "cajero".to_string(), "caja123".to_string())
        .wait()
        .unwrap();

    for &(username, password) in &[("admin", "otra"), ("nadie", "secreto")] {
        match guest
            .login(TENANT.to_string(), username.to_string(), password.to_string())
            .wait()
            .map_err(|e| e.kind())
        {
            Err(ErrorKind::Unauthorized(_)) => {}
            other => panic!("expected unauthorized, got {:?}", other),
        }
    }
    assert_invalid(guest.login(TENANT.to_string(), "admin".to_string(), String::new()).wait());
}

#[test]
fn admin_accounts_are_unique_per_tenant() {
    let app = TestApp::new();
    let admin = app.admin();

    admin
        .create_admin_user(TENANT.to_string(), "mozo".to_string(), "mesa1".to_string())
        .wait()
        .unwrap();
    match admin
        .create_admin_user(TENANT.to_string(), "mozo".to_string(), "otra".to_string())
        .wait()
        .map_err(|e| e.kind())
    {
        Err(ErrorKind::Conflict(_)) => {}
        other => panic!("expected conflict, got {:?}", other),
    }
    assert_forbidden(
        app.admin_of("local2")
            .create_admin_user(TENANT.to_string(), "intruso".to_string(), "x".to_string())
            .wait(),
    );

    let mut users = admin.list_admin_users(TENANT.to_string()).wait().unwrap();
    users.sort();
    assert_eq!(users, vec!["admin", "cajero", "mozo"]);
    app.guest()
        .login(TENANT.to_string(), "mozo".to_string(), "mesa1".to_string())
        .wait()
        .unwrap();
}

#[test]
fn catalog_upsert_edit_and_soft_delete() {
    let app = TestApp::new();
    let admin = app.admin();

    let seeded = app.guest().list_products(TENANT.to_string(), false).wait().unwrap();
    let pizza = seeded.iter().find(|p| p.id == "p1").unwrap();
    assert_eq!(pizza.details, "Muzzarella");
    assert_eq!(pizza.stock, 50);

    let payload = json!({"tenant_slug": TENANT, "id": "p3", "name": "Agua", "price": "150", "stock": 10, "section": "bebidas"});
    let product = UpsertProduct::from_payload(&payload).unwrap();
    assert_eq!(admin.upsert_product(product.clone()).wait().unwrap(), Upserted::Created);
    assert_eq!(admin.upsert_product(product).wait().unwrap(), Upserted::Updated);

    let update = ProductUpdate::from_payload(&json!({"stock": -4, "price": 180})).unwrap();
    admin
        .update_product(TENANT.to_string(), "p3".to_string(), update)
        .wait()
        .unwrap();
    admin.deactivate_product(TENANT.to_string(), "p3".to_string()).wait().unwrap();

    let active = app.guest().list_products(TENANT.to_string(), false).wait().unwrap();
    assert!(active.iter().all(|p| p.id != "p3"));
    let all = app.guest().list_products(TENANT.to_string(), true).wait().unwrap();
    let water = all.iter().find(|p| p.id == "p3").unwrap();
    assert_eq!((water.stock, water.price, water.active), (0, 180, false));

    match admin
        .deactivate_product(TENANT.to_string(), "p404".to_string())
        .wait()
        .map_err(|e| e.kind())
    {
        Err(ErrorKind::NotFound(_)) => {}
        other => panic!("expected not found, got {:?}", other),
    }
}

#[test]
fn tenant_config_reads_and_writes() {
    let app = TestApp::new();
    let admin = app.admin();

    let tenants = app.guest().list_tenants().wait().unwrap();
    assert_eq!(tenants.len(), 1);
    assert_eq!(tenants[0].slug, TENANT);
    assert_eq!(tenants[0].name, "Local Uno");

    let config = app.guest().public_config(TENANT.to_string()).wait().unwrap();
    assert_eq!(config["shipping_cost"], json!(300));

    let updated = admin
        .update_config(TENANT.to_string(), json!({"shipping_cost": "450", "time_auto": "0"}))
        .wait()
        .unwrap();
    assert_eq!(updated["shipping_cost"], json!(450));
    assert_eq!(updated["time_auto"], json!(false));
    let config = app.guest().public_config(TENANT.to_string()).wait().unwrap();
    assert_eq!(config["shipping_cost"], json!(450));

    let sla = admin.update_sla(TENANT.to_string(), Sla::clamped(0, 0)).wait().unwrap();
    assert_eq!((sla.warning_minutes, sla.critical_minutes), (1, 2));
    assert_eq!(app.guest().get_sla(TENANT.to_string()).wait().unwrap(), sla);
    match admin.update_sla("local9".to_string(), sla).wait().map_err(|e| e.kind()) {
        Err(ErrorKind::NotFound(_)) => {}
        other => panic!("expected not found, got {:?}", other),
    }

    let layout = json!({"zones": [{"id": 1, "name": "Patio", "tables": [{"id": "P1"}]}]});
    admin.update_tables(TENANT.to_string(), layout.clone()).wait().unwrap();
    assert_eq!(app.guest().get_tables(TENANT.to_string()).wait().unwrap(), layout);
}

#[test]
fn carousel_slides_follow_their_position() {
    let app = TestApp::new();
    let admin = app.admin();

    assert_invalid(admin.create_slide(TENANT.to_string(), json!({"title": "Sin imagen"})).wait());
    let second = admin
        .create_slide(TENANT.to_string(), json!({"image_url": "/uploads/b.png", "position": 2}))
        .wait()
        .unwrap();
    let first = admin
        .create_slide(TENANT.to_string(), json!({"image_url": "/uploads/a.png", "position": 1}))
        .wait()
        .unwrap();

    let slides = app.guest().list_slides(TENANT.to_string()).wait().unwrap();
    assert_eq!(slides.iter().map(|s| s.id).collect::<Vec<_>>(), vec![first, second]);

    admin
        .update_slide(second, SlideUpdate::from_payload(&json!({"position": 0, "title": "Promo"})))
        .wait()
        .unwrap();
    assert_invalid(admin.update_slide(second, SlideUpdate::default()).wait());
    let slides = app.guest().list_slides(TENANT.to_string()).wait().unwrap();
    assert_eq!(slides[0].id, second);
    assert_eq!(slides[0].title, Some("Promo".to_string()));

    admin.delete_slide(first).wait().unwrap();
    assert_eq!(app.guest().list_slides(TENANT.to_string()).wait().unwrap().len(), 1);
}
