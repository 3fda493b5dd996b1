//! Repo for tenant_config table

use failure::Error as FailureError;
use failure::Fail;
use serde_json::Value;

use crate::db::DbConnection;
use crate::models::authorization::*;
use crate::models::TenantConfigRow;
use crate::repos::acl;
use crate::repos::error::{Error, ErrorKind, ErrorSource};
use crate::repos::legacy_acl::*;
use crate::repos::types::RepoResult;

/// Tenant config repository
pub trait TenantConfigRepo {
    fn get(&self, tenant_slug: &str) -> RepoResult<Option<TenantConfigRow>>;

    /// Every stored tenant, ordered by slug
    fn list(&self) -> RepoResult<Vec<TenantConfigRow>>;

    /// Replaces the whole config document of the tenant
    fn upsert(&self, tenant_slug: &str, config: &Value) -> RepoResult<()>;
}

pub struct TenantConfigRepoImpl<'a> {
    pub db_conn: &'a DbConnection,
    pub acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>,
}

impl<'a> TenantConfigRepoImpl<'a> {
    pub fn new(db_conn: &'a DbConnection, acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>) -> Self {
        Self { db_conn, acl }
    }
}

impl<'a> TenantConfigRepo for TenantConfigRepoImpl<'a> {
    fn get(&self, tenant_slug: &str) -> RepoResult<Option<TenantConfigRow>> {
        debug!("Getting config of tenant {}", tenant_slug);

        acl::check(&*self.acl, Resource::TenantConfig, Action::Read, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .load_one::<TenantConfigRow>(
                "SELECT tenant_slug, config_json FROM tenant_config WHERE tenant_slug = ?",
                &params![tenant_slug],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => tenant_slug)
            })
    }

    fn list(&self) -> RepoResult<Vec<TenantConfigRow>> {
        debug!("Listing tenant configs");

        acl::check(&*self.acl, Resource::TenantConfig, Action::Read, self, None)?;

        self.db_conn
            .load::<TenantConfigRow>("SELECT tenant_slug, config_json FROM tenant_config ORDER BY tenant_slug ASC", &[])
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind)
            })
    }

    fn upsert(&self, tenant_slug: &str, config: &Value) -> RepoResult<()> {
        debug!("Storing config of tenant {}", tenant_slug);

        acl::check(&*self.acl, Resource::TenantConfig, Action::Write, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .execute(
                "INSERT OR REPLACE INTO tenant_config (tenant_slug, config_json) VALUES (?, ?)",
                &params![tenant_slug, config.to_string()],
            )
            .map(|_| ())
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => tenant_slug, config)
            })
    }
}

impl<'a> CheckScope<Scope, TenantSlug> for TenantConfigRepoImpl<'a> {
    fn is_in_scope(&self, tenant_slug: &str, scope: &Scope, obj: Option<&TenantSlug>) -> bool {
        acl::tenant_in_scope(tenant_slug, scope, obj)
    }
}
