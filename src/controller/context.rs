//! `Context` is a top level module contains static context and dynamic context for each request
use std::sync::Arc;

use futures_cpupool::CpuPool;

use super::routes::*;
use super::session::SessionStore;
use crate::config::Config;
use crate::db::DbPool;
use crate::http::router::RouteParser;
use crate::models::AdminIdentity;
use crate::repos::repo_factory::*;
use crate::services::tenants::TenantConfigCache;

/// Static context for all app
#[derive(Clone)]
pub struct StaticContext<F: ReposFactory> {
    pub db_pool: DbPool,
    pub cpu_pool: CpuPool,
    pub config: Arc<Config>,
    pub route_parser: Arc<RouteParser<Route>>,
    pub repo_factory: F,
    pub sessions: SessionStore,
    pub tenant_cache: TenantConfigCache,
}

impl<F: ReposFactory> StaticContext<F> {
    /// Create a new static context
    pub fn new(db_pool: DbPool, cpu_pool: CpuPool, config: Arc<Config>, repo_factory: F) -> Self {
        let route_parser = Arc::new(create_route_parser());
        let sessions = SessionStore::new(config.auth.session_ttl_s);
        let tenant_cache = TenantConfigCache::new(config.tenants.cache_ttl_s);
        Self {
            db_pool,
            cpu_pool,
            config,
            route_parser,
            repo_factory,
            sessions,
            tenant_cache,
        }
    }
}

/// Dynamic context for each request
#[derive(Clone, Debug, Default)]
pub struct DynamicContext {
    /// Set when the request carries an authenticated admin session
    pub identity: Option<AdminIdentity>,
}

impl DynamicContext {
    /// Create a new dynamic context for each request
    pub fn new(identity: Option<AdminIdentity>) -> Self {
        Self { identity }
    }
}
