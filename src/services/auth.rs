//! Back office authentication and admin accounts
use failure::Fail;

use super::error::{fail, invalid, Error, ErrorKind, ErrorSource};
use super::types::ServiceFuture;
use super::Service;
use crate::models::*;
use crate::repos::repo_factory::ReposFactory;

const BAD_CREDENTIALS: &str = "usuario o contraseña inválidos";
const FOREIGN_TENANT: &str = "acceso denegado al tenant";

pub trait AuthService {
    /// Checks a password against the stored bcrypt hash
    fn login(&self, tenant_slug: String, username: String, password: String) -> ServiceFuture<AdminIdentity>;
    /// Usernames of the tenant's admins
    fn list_admin_users(&self, tenant_slug: String) -> ServiceFuture<Vec<String>>;
    fn create_admin_user(&self, tenant_slug: String, username: String, password: String) -> ServiceFuture<()>;
}

impl<F: ReposFactory> Service<F> {
    pub(super) fn check_tenant_access(&self, tenant_slug: &str) -> Result<(), Error> {
        match self.dynamic_context.identity {
            Some(ref identity) if !identity.can_access(tenant_slug) => fail(ErrorKind::Forbidden(FOREIGN_TENANT.to_string())),
            _ => Ok(()),
        }
    }
}

impl<F: ReposFactory> AuthService for Service<F> {
    fn login(&self, tenant_slug: String, username: String, password: String) -> ServiceFuture<AdminIdentity> {
        debug!("Login attempt of {} for tenant {}", username, tenant_slug);
        let repo_factory = self.static_context.repo_factory.clone();
        self.spawn_on_pool(move |conn| {
            if tenant_slug.is_empty() || username.is_empty() || password.is_empty() {
                return fail(invalid("username", "credenciales incompletas"));
            }
            let repo = repo_factory.create_admin_users_repo_with_sys_acl(&conn);
            let user = match repo.find(&tenant_slug, &username).map_err(ectx!(convert => tenant_slug, username))? {
                Some(user) => user,
                None => return fail(ErrorKind::Unauthorized(BAD_CREDENTIALS.to_string())),
            };
            let matches = bcrypt::verify(&password, &user.password_hash).unwrap_or_else(|e| {
                warn!("Stored hash of {} in {} is unreadable: {}", username, tenant_slug, e);
                false
            });
            if !matches {
                return fail(ErrorKind::Unauthorized(BAD_CREDENTIALS.to_string()));
            }
            info!("Admin {} logged in to {}", username, tenant_slug);
            Ok(AdminIdentity::new(user.username, Some(tenant_slug)))
        })
    }

    fn list_admin_users(&self, tenant_slug: String) -> ServiceFuture<Vec<String>> {
        debug!("Listing admin users of {}", tenant_slug);
        if let Err(e) = self.check_tenant_access(&tenant_slug) {
            return Box::new(futures::future::err(e));
        }
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        self.spawn_on_pool(move |conn| {
            let repo = repo_factory.create_admin_users_repo(&conn, identity.as_ref());
            let users = repo.list(&tenant_slug).map_err(ectx!(convert => tenant_slug))?;
            Ok(users.into_iter().map(|user| user.username).collect())
        })
    }

    fn create_admin_user(&self, tenant_slug: String, username: String, password: String) -> ServiceFuture<()> {
        debug!("Creating admin user {} in {}", username, tenant_slug);
        if let Err(e) = self.check_tenant_access(&tenant_slug) {
            return Box::new(futures::future::err(e));
        }
        let repo_factory = self.static_context.repo_factory.clone();
        let identity = self.identity();
        let cost = self.static_context.config.auth.bcrypt_cost;
        self.spawn_on_pool(move |conn| {
            if tenant_slug.is_empty() || username.is_empty() || password.is_empty() {
                return fail(invalid("username", "datos incompletos"));
            }
            let repo = repo_factory.create_admin_users_repo(&conn, identity.as_ref());
            if repo.find(&tenant_slug, &username).map_err(ectx!(convert => tenant_slug, username))?.is_some() {
                return fail(ErrorKind::Conflict("usuario ya existe".to_string()));
            }
            let password_hash = bcrypt::hash(&password, cost).map_err(ectx!(ErrorSource::Bcrypt, ErrorKind::Internal))?;
            repo.create(NewAdminUser {
                tenant_slug: tenant_slug.clone(),
                username: username.clone(),
                password_hash,
            })
            .map_err(ectx!(convert => tenant_slug, username))?;
            info!("Admin user {} created in {}", username, tenant_slug);
            Ok(())
        })
    }
}
