//! Repos is a module responsible for interacting with access control lists

use std::collections::HashMap;
use std::rc::Rc;

use failure::Error as FailureError;
use failure::Fail;

use super::error::{Error, ErrorKind, ErrorSource};
use super::legacy_acl::{Acl, CheckScope};
use super::types::RepoResult;

use crate::models::authorization::*;
use crate::models::AdminIdentity;

const RESOURCES: &[Resource] = &[
    Resource::Orders,
    Resource::CashSessions,
    Resource::Archive,
    Resource::TenantConfig,
    Resource::Products,
    Resource::Carousel,
    Resource::AdminUsers,
];

pub fn check<T>(
    acl: &dyn Acl<Resource, Action, Scope, FailureError, T>,
    resource: Resource,
    action: Action,
    scope_checker: &dyn CheckScope<Scope, T>,
    obj: Option<&T>,
) -> RepoResult<()> {
    let allowed = acl
        .allows(resource, action, scope_checker, obj)
        .map_err(ectx!(ErrorSource::Acl, ErrorKind::Internal => resource, action))?;
    if allowed {
        Ok(())
    } else {
        let e = format_err!("Denied request to do {} on {}", action, resource);
        Err(ectx!(err e, ErrorSource::Acl, ErrorKind::Forbidden))
    }
}

/// Scope check shared by every repo: rows are owned by their tenant
pub fn tenant_in_scope(tenant_slug: &str, scope: &Scope, obj: Option<&TenantSlug>) -> bool {
    match *scope {
        Scope::All => true,
        Scope::Owned => obj.map(|owner| owner.inner() == tenant_slug).unwrap_or(false),
    }
}

/// ApplicationAcl contains main logic for manipulation with resources
#[derive(Clone)]
pub struct ApplicationAcl {
    acls: Rc<HashMap<Role, Vec<Permission>>>,
    roles: Vec<Role>,
    tenant_slug: String,
}

impl ApplicationAcl {
    pub fn new(identity: Option<&AdminIdentity>) -> Self {
        let mut hash = HashMap::new();
        hash.insert(Role::Superadmin, RESOURCES.iter().map(|r| permission!(*r)).collect());
        hash.insert(
            Role::Admin,
            RESOURCES
                .iter()
                .flat_map(|r| vec![permission!(*r, Action::Read), permission!(*r, Action::Write, Scope::Owned)])
                .collect(),
        );
        hash.insert(
            Role::Guest,
            RESOURCES
                .iter()
                .filter(|r| **r != Resource::AdminUsers)
                .map(|r| permission!(*r, Action::Read))
                .collect(),
        );

        let (role, tenant_slug) = match identity {
            None => (Role::Guest, String::new()),
            Some(AdminIdentity { tenant_slug: None, .. }) => (Role::Superadmin, String::new()),
            Some(AdminIdentity {
                tenant_slug: Some(ref tenant),
                ..
            }) => (Role::Admin, tenant.clone()),
        };
        ApplicationAcl {
            acls: Rc::new(hash),
            roles: vec![role],
            tenant_slug,
        }
    }
}

impl<T> Acl<Resource, Action, Scope, FailureError, T> for ApplicationAcl {
    fn allows(
        &self,
        resource: Resource,
        action: Action,
        scope_checker: &dyn CheckScope<Scope, T>,
        obj: Option<&T>,
    ) -> Result<bool, FailureError> {
        let empty: Vec<Permission> = Vec::new();
        let tenant_slug = &self.tenant_slug;
        let hashed_acls = self.acls.clone();
        let acls = self
            .roles
            .iter()
            .flat_map(|role| hashed_acls.get(role).unwrap_or(&empty))
            .filter(|permission| (permission.resource == resource) && ((permission.action == action) || (permission.action == Action::All)))
            .filter(|permission| scope_checker.is_in_scope(tenant_slug, &permission.scope, obj));

        Ok(acls.count() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct ScopeChecker;

    impl CheckScope<Scope, TenantSlug> for ScopeChecker {
        fn is_in_scope(&self, tenant_slug: &str, scope: &Scope, obj: Option<&TenantSlug>) -> bool {
            tenant_in_scope(tenant_slug, scope, obj)
        }
    }

    fn admin_of(tenant: &str) -> AdminIdentity {
        AdminIdentity::new("ana".to_string(), Some(tenant.to_string()))
    }

    #[test]
    fn test_admin_writes_only_own_tenant() {
        let identity = admin_of("local1");
        let acl = ApplicationAcl::new(Some(&identity));
        let s = ScopeChecker::default();
        let own = TenantSlug::new("local1");
        let other = TenantSlug::new("local2");

        assert_eq!(acl.allows(Resource::Orders, Action::Write, &s, Some(&own)).unwrap(), true);
        assert_eq!(acl.allows(Resource::Orders, Action::Write, &s, Some(&other)).unwrap(), false);
        assert_eq!(acl.allows(Resource::Orders, Action::Read, &s, Some(&other)).unwrap(), true);
        assert_eq!(acl.allows(Resource::Orders, Action::All, &s, Some(&own)).unwrap(), false);
    }

    #[test]
    fn test_superadmin_for_every_tenant() {
        let identity = AdminIdentity::new("admin".to_string(), None);
        let acl = ApplicationAcl::new(Some(&identity));
        let s = ScopeChecker::default();
        let other = TenantSlug::new("local2");

        assert_eq!(acl.allows(Resource::CashSessions, Action::All, &s, Some(&other)).unwrap(), true);
        assert_eq!(acl.allows(Resource::CashSessions, Action::Write, &s, Some(&other)).unwrap(), true);
        assert_eq!(acl.allows(Resource::AdminUsers, Action::Read, &s, None).unwrap(), true);
    }

    #[test]
    fn test_guest_only_reads() {
        let acl = ApplicationAcl::new(None);
        let s = ScopeChecker::default();
        let tenant = TenantSlug::new("local1");

        assert_eq!(acl.allows(Resource::Products, Action::Read, &s, Some(&tenant)).unwrap(), true);
        assert_eq!(acl.allows(Resource::Products, Action::Write, &s, Some(&tenant)).unwrap(), false);
        assert_eq!(acl.allows(Resource::AdminUsers, Action::Read, &s, Some(&tenant)).unwrap(), false);
    }

    #[test]
    fn test_check_reports_denial() {
        let acl = ApplicationAcl::new(None);
        let s = ScopeChecker::default();
        let err = check(&acl, Resource::Carousel, Action::Write, &s, None).unwrap_err();
        match err.kind() {
            ErrorKind::Forbidden => {}
            other => panic!("unexpected error kind {:?}", other),
        }
        assert!(check(&acl, Resource::Carousel, Action::Read, &s, None).is_ok());
    }
}
