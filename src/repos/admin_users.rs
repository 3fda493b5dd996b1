//! Repo for admin_users table

use failure::Error as FailureError;
use failure::Fail;

use crate::db::DbConnection;
use crate::models::authorization::*;
use crate::models::{AdminUser, NewAdminUser, Username};
use crate::repos::acl;
use crate::repos::error::{Error, ErrorKind, ErrorSource};
use crate::repos::legacy_acl::*;
use crate::repos::types::RepoResult;

/// Admin users repository
pub trait AdminUsersRepo {
    fn find(&self, tenant_slug: &str, username: &str) -> RepoResult<Option<AdminUser>>;

    /// Usernames of the tenant in alphabetical order
    fn list(&self, tenant_slug: &str) -> RepoResult<Vec<Username>>;

    fn create(&self, payload: NewAdminUser) -> RepoResult<()>;
}

pub struct AdminUsersRepoImpl<'a> {
    pub db_conn: &'a DbConnection,
    pub acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>,
}

impl<'a> AdminUsersRepoImpl<'a> {
    pub fn new(db_conn: &'a DbConnection, acl: Box<dyn Acl<Resource, Action, Scope, FailureError, TenantSlug>>) -> Self {
        Self { db_conn, acl }
    }
}

impl<'a> AdminUsersRepo for AdminUsersRepoImpl<'a> {
    fn find(&self, tenant_slug: &str, username: &str) -> RepoResult<Option<AdminUser>> {
        debug!("Looking up admin user {} of {}", username, tenant_slug);

        acl::check(&*self.acl, Resource::AdminUsers, Action::Read, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .load_one::<AdminUser>(
                "SELECT username, password_hash FROM admin_users WHERE tenant_slug = ? AND username = ?",
                &params![tenant_slug, username],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => tenant_slug, username)
            })
    }

    fn list(&self, tenant_slug: &str) -> RepoResult<Vec<Username>> {
        debug!("Listing admin users of {}", tenant_slug);

        acl::check(&*self.acl, Resource::AdminUsers, Action::Read, self, Some(&TenantSlug::new(tenant_slug)))?;

        self.db_conn
            .load::<Username>(
                "SELECT username FROM admin_users WHERE tenant_slug = ? ORDER BY username ASC",
                &params![tenant_slug],
            )
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => tenant_slug)
            })
    }

    fn create(&self, payload: NewAdminUser) -> RepoResult<()> {
        debug!("Creating admin user {} of {}", payload.username, payload.tenant_slug);

        acl::check(
            &*self.acl,
            Resource::AdminUsers,
            Action::Write,
            self,
            Some(&TenantSlug::new(payload.tenant_slug.clone())),
        )?;

        self.db_conn
            .execute(
                "INSERT INTO admin_users (tenant_slug, username, password_hash) VALUES (?, ?, ?)",
                &params![payload.tenant_slug.clone(), payload.username.clone(), payload.password_hash.clone()],
            )
            .map(|_| ())
            .map_err(|e| {
                let kind = ErrorKind::from(&e);
                ectx!(err e, ErrorSource::Diesel, kind => payload.tenant_slug, payload.username)
            })
    }
}

impl<'a> CheckScope<Scope, TenantSlug> for AdminUsersRepoImpl<'a> {
    fn is_in_scope(&self, tenant_slug: &str, scope: &Scope, obj: Option<&TenantSlug>) -> bool {
        acl::tenant_in_scope(tenant_slug, scope, obj)
    }
}
