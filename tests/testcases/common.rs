use std::fs;
use std::sync::Arc;

use futures::Future;
use futures_cpupool::CpuPool;
use serde_json::Value;
use tempfile::TempDir;

use gastro_lib::config::{Archive, Auth, Config, Server, Tenants};
use gastro_lib::controller::context::{DynamicContext, StaticContext};
use gastro_lib::db::{DbConnectionManager, PooledDbConnection};
use gastro_lib::models::{AdminIdentity, CreateOrder, Order};
use gastro_lib::repos::repo_factory::ReposFactoryImpl;
use gastro_lib::services::orders::OrdersService;
use gastro_lib::services::{Error as ServiceError, ErrorKind as ServiceErrorKind, Service};

pub const TENANT: &str = "local1";

/// Database and config directory living as long as the test
pub struct TestApp {
    pub dir: TempDir,
    pub static_context: StaticContext<ReposFactoryImpl>,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join("tenants");
        fs::create_dir_all(&config_dir).unwrap();
        let tenant_file = json!({
            "meta": {"slug": TENANT, "branding": {"name": "Local Uno"}},
            "shipping_cost": 300,
            "admins": [{"username": "cajero", "password": "caja123"}],
            "catalog": [
                {"id": "p1", "name": "Pizza", "price": 1000, "description": "Muzzarella"},
                {"id": "p2", "name": "Empanada", "price": 250}
            ]
        });
        fs::write(config_dir.join("local1.json"), tenant_file.to_string()).unwrap();

        let config = Config {
            server: Server {
                host: "127.0.0.1".to_string(),
                port: "0".to_string(),
                database: dir.path().join("gastro.db").to_str().unwrap().to_string(),
                thread_count: 2,
                db_pool_size: 2,
                static_dir: dir.path().join("static").to_str().unwrap().to_string(),
                config_dir: config_dir.to_str().unwrap().to_string(),
            },
            auth: Auth {
                admin_username: "admin".to_string(),
                admin_password: "secreto".to_string(),
                admin_legacy_password: None,
                bcrypt_cost: 4,
                allow_dev_login: false,
                session_ttl_s: 3600,
                secure_cookie: false,
            },
            tenants: Tenants {
                default_slug: TENANT.to_string(),
                cache_ttl_s: 60,
            },
            archive: Archive {
                interval_s: 60,
                threshold_hours: 0,
            },
            cloudinary: None,
        };

        let manager = DbConnectionManager::new(config.server.database.clone());
        let db_pool = r2d2::Pool::builder().max_size(config.server.db_pool_size).build(manager).unwrap();
        gastro_lib::prepare_database(&db_pool, &config).unwrap();

        let static_context = StaticContext::new(db_pool, CpuPool::new(2), Arc::new(config), ReposFactoryImpl::new());
        TestApp { dir, static_context }
    }

    pub fn guest(&self) -> Service<ReposFactoryImpl> {
        Service::new(self.static_context.clone(), DynamicContext::new(None))
    }

    pub fn admin(&self) -> Service<ReposFactoryImpl> {
        self.admin_of(TENANT)
    }

    pub fn admin_of(&self, tenant: &str) -> Service<ReposFactoryImpl> {
        let identity = AdminIdentity::new("admin".to_string(), Some(tenant.to_string()));
        Service::new(self.static_context.clone(), DynamicContext::new(Some(identity)))
    }

    pub fn conn(&self) -> PooledDbConnection {
        self.static_context.db_pool.get().unwrap()
    }

    /// Places a storefront order from a JSON body
    pub fn place(&self, payload: Value) -> Order {
        let payload = CreateOrder::from_payload(&payload, TENANT).unwrap();
        self.guest().create_order(payload).wait().unwrap()
    }

    /// Table order of `qty` pizzas
    pub fn place_pizzas(&self, qty: i64) -> Order {
        self.place(json!({
            "table_number": "4",
            "items": [{"id": "p1", "name": "Pizza", "price": 1000, "qty": qty}]
        }))
    }
}

pub fn assert_invalid<T: std::fmt::Debug>(result: Result<T, ServiceError>) {
    match result.map_err(|e| e.kind()) {
        Err(ServiceErrorKind::Validation(_)) => {}
        other => panic!("expected a validation error, got {:?}", other),
    }
}

pub fn assert_forbidden<T: std::fmt::Debug>(result: Result<T, ServiceError>) {
    match result.map_err(|e| e.kind()) {
        Err(ServiceErrorKind::Forbidden(_)) => {}
        other => panic!("expected a forbidden error, got {:?}", other),
    }
}
