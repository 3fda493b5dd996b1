//! Tenant configuration: the cached config blob and the typed views the admin panel edits
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use failure::Fail;
use serde_json::{Map, Value};

use super::error::{fail, Error, ErrorKind};
use super::types::{ServiceFuture, ServiceResult};
use super::Service;
use crate::models::time::{days_ago, minutes_between};
use crate::models::*;
use crate::repos::repo_factory::ReposFactory;
use crate::repos::{OrderHistoryRepo, TenantConfigRepo};

/// Parsed config blobs by slug, dropped after `ttl` or on any write
#[derive(Clone)]
pub struct TenantConfigCache {
    ttl: Duration,
    entries: Arc<Mutex<HashMap<String, (Instant, Value)>>>,
}

impl TenantConfigCache {
    pub fn new(ttl_s: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_s),
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn get(&self, slug: &str) -> Option<Value> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(slug)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, config)| config.clone())
    }

    pub fn put(&self, slug: &str, config: Value) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(slug.to_string(), (Instant::now(), config));
        }
    }

    pub fn invalidate(&self, slug: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(slug);
        }
    }
}

/// Config of a tenant through the cache; unknown tenants read as `{}`
pub fn cached_config(cache: &TenantConfigCache, repo: &dyn TenantConfigRepo, slug: &str) -> ServiceResult<Value> {
    if let Some(config) = cache.get(slug) {
        return Ok(config);
    }
    let config = repo
        .get(slug)
        .map_err(ectx!(convert => slug))?
        .map(|row| row.config())
        .unwrap_or_else(|| Value::Object(Map::new()));
    cache.put(slug, config.clone());
    Ok(config)
}

/// Reads the stored blob, lets `f` change it and writes it back
fn modify_existing<R, Func>(cache: &TenantConfigCache, repo: &dyn TenantConfigRepo, slug: &str, f: Func) -> ServiceResult<R>
where
    Func: FnOnce(&mut Value) -> R,
{
    let mut config = match repo.get(slug).map_err(ectx!(convert => slug))? {
        Some(row) => row.config(),
        None => return fail(ErrorKind::NotFound("tenant no encontrado".to_string())),
    };
    let result = f(&mut config);
    repo.upsert(slug, &config).map_err(ectx!(convert => slug))?;
    cache.invalidate(slug);
    Ok(result)
}

/// Replaces the waiting times with what the kitchen actually took lately
fn apply_auto_times(history_repo: &dyn OrderHistoryRepo, slug: &str, config: &mut Value) -> ServiceResult<()> {
    let since = days_ago(7);
    for (key, order_type, status) in AUTO_TIME_TARGETS {
        let (order_type, status) = match (order_type.parse::<OrderType>(), status.parse::<OrderStatus>()) {
            (Ok(order_type), Ok(status)) => (order_type, status),
            _ => continue,
        };
        let rows = history_repo
            .reached_status(slug, order_type, status, &since)
            .map_err(ectx!(convert => slug, order_type, status))?;
        let durations: Vec<f64> = rows
            .iter()
            .filter_map(|row| minutes_between(&row.created_at, &row.changed_at))
            .collect();
        if let Some(minutes) = average_wait_minutes(&durations).filter(|m| *m > 0) {
            if let Some(map) = config.as_object_mut() {
                map.insert(key.to_string(), json!(minutes));
            }
        }
    }
    Ok(())
}

pub trait TenantsService {
    /// Every configured tenant with its display name
    fn list_tenants(&self) -> ServiceFuture<Vec<TenantSummary>>;
    /// Config blob as the storefront reads it, with automatic waiting times applied
    fn public_config(&self, slug: String) -> ServiceFuture<Value>;
    /// Stores the integer knobs and `time_auto`, creating the tenant row when needed
    fn update_config(&self, slug: String, patch: Value) -> ServiceFuture<Value>;
    fn get_sla(&self, slug: String) -> ServiceFuture<Sla>;
    fn update_sla(&self, slug: String, sla: Sla) -> ServiceFuture<Sla>;
    fn get_prefs(&self, slug: String) -> ServiceFuture<Prefs>;
    fn get_header(&self, slug: String) -> ServiceFuture<HeaderContact>;
    fn update_header(&self, slug: String, patch: Value) -> ServiceFuture<HeaderContact>;
    fn update_checkout(&self, slug: String, patch: Value) -> ServiceFuture<CheckoutSettings>;
    fn get_tables(&self, slug: String) -> ServiceFuture<Value>;
    fn update_tables(&self, slug: String, tables: Value) -> ServiceFuture<()>;
}

impl<F: ReposFactory> Service<F> {
    /// Runs `f` over the cached config of `slug`
    fn read_config<R, Func>(&self, slug: String, f: Func) -> ServiceFuture<R>
    where
        Func: FnOnce(&Value) -> R + Send + 'static,
        R: Send + 'static,
    {
        let repo_factory = self.static_context.repo_factory.clone();
        let cache = self.static_context.tenant_cache.clone();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_tenant_config_repo_with_sys_acl(&conn);
            cached_config(&cache, &*repo, &slug).map(|config| f(&config))
        })
    }

    /// Applies `f` to the stored config of an existing tenant
    fn write_config<R, Func>(&self, slug: String, f: Func) -> ServiceFuture<R>
    where
        Func: FnOnce(&mut Value) -> R + Send + 'static,
        R: Send + 'static,
    {
        let repo_factory = self.static_context.repo_factory.clone();
        let cache = self.static_context.tenant_cache.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_tenant_config_repo(&conn, identity.as_ref());
            modify_existing(&cache, &*repo, &slug, f)
        })
    }
}

impl<F: ReposFactory> TenantsService for Service<F> {
    fn list_tenants(&self) -> ServiceFuture<Vec<TenantSummary>> {
        debug!("Listing tenants");
        let repo_factory = self.static_context.repo_factory.clone();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_tenant_config_repo_with_sys_acl(&conn);
            let rows = repo.list().map_err(ectx!(convert))?;
            Ok(rows
                .into_iter()
                .map(|row| {
                    let config = row.config();
                    TenantSummary::new(row.tenant_slug, &config)
                })
                .collect())
        })
    }

    fn public_config(&self, slug: String) -> ServiceFuture<Value> {
        debug!("Reading config of tenant {}", slug);
        let repo_factory = self.static_context.repo_factory.clone();
        let cache = self.static_context.tenant_cache.clone();
        self.spawn_on_pool(move |conn| {
            let config_repo = repo_factory.create_tenant_config_repo_with_sys_acl(&conn);
            let mut config = cached_config(&cache, &*config_repo, &slug)?;
            if time_auto_enabled(&config) {
                let history_repo = repo_factory.create_order_history_repo_with_sys_acl(&conn);
                apply_auto_times(&*history_repo, &slug, &mut config)?;
            }
            Ok(config)
        })
    }

    fn update_config(&self, slug: String, patch: Value) -> ServiceFuture<Value> {
        info!("Updating config of tenant {}", slug);
        let repo_factory = self.static_context.repo_factory.clone();
        let cache = self.static_context.tenant_cache.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_tenant_config_repo(&conn, identity.as_ref());
            let mut config = repo
                .get(&slug)
                .map_err(ectx!(convert => slug))?
                .map(|row| row.config())
                .unwrap_or_else(|| Value::Object(Map::new()));
            apply_config_patch(&mut config, &patch);
            repo.upsert(&slug, &config).map_err(ectx!(convert => slug))?;
            cache.invalidate(&slug);
            Ok(config)
        })
    }

    fn get_sla(&self, slug: String) -> ServiceFuture<Sla> {
        self.read_config(slug, Sla::from_config)
    }

    fn update_sla(&self, slug: String, sla: Sla) -> ServiceFuture<Sla> {
        info!("Updating SLA of tenant {}: {:?}", slug, sla);
        self.write_config(slug, move |config| {
            sla.apply(config);
            sla
        })
    }

    fn get_prefs(&self, slug: String) -> ServiceFuture<Prefs> {
        self.read_config(slug, Prefs::from_config)
    }

    fn get_header(&self, slug: String) -> ServiceFuture<HeaderContact> {
        self.read_config(slug, HeaderContact::from_config)
    }

    fn update_header(&self, slug: String, patch: Value) -> ServiceFuture<HeaderContact> {
        info!("Updating header contact of tenant {}", slug);
        self.write_config(slug, move |config| HeaderContact::apply_patch(config, &patch))
    }

    fn update_checkout(&self, slug: String, patch: Value) -> ServiceFuture<CheckoutSettings> {
        info!("Updating checkout settings of tenant {}", slug);
        self.write_config(slug, move |config| CheckoutSettings::apply_patch(config, &patch))
    }

    fn get_tables(&self, slug: String) -> ServiceFuture<Value> {
        self.read_config(slug, tables_view)
    }

    fn update_tables(&self, slug: String, tables: Value) -> ServiceFuture<()> {
        info!("Updating table layout of tenant {}", slug);
        let repo_factory = self.static_context.repo_factory.clone();
        let cache = self.static_context.tenant_cache.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_tenant_config_repo(&conn, identity.as_ref());
            let mut config = repo
                .get(&slug)
                .map_err(ectx!(convert => slug))?
                .map(|row| row.config())
                .unwrap_or_else(|| Value::Object(Map::new()));
            if let Some(map) = config.as_object_mut() {
                map.insert("tables".to_string(), tables);
            }
            repo.upsert(&slug, &config).map_err(ectx!(convert => slug))?;
            cache.invalidate(&slug);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_expires_and_invalidates() {
        let cache = TenantConfigCache::new(300);
        cache.put("local1", json!({"shipping_cost": 500}));
        assert_eq!(cache.get("local1"), Some(json!({"shipping_cost": 500})));
        cache.invalidate("local1");
        assert_eq!(cache.get("local1"), None);

        let expired = TenantConfigCache::new(0);
        expired.put("local1", json!({}));
        assert_eq!(expired.get("local1"), None);
    }
}
