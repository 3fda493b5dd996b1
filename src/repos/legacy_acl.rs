//! Generic access control list traits used by every repo

use std::marker::PhantomData;

/// Access control layer for a repo. Tells whether `action` on `resource` is allowed,
/// asking `scope_checker` whether `obj` falls inside a permission's scope.
pub trait Acl<Resource, Action, Scope, Error, T> {
    fn allows(
        &self,
        resource: Resource,
        action: Action,
        scope_checker: &dyn CheckScope<Scope, T>,
        obj: Option<&T>,
    ) -> Result<bool, Error>;
}

/// Implemented by repos: is `obj` inside `scope` for the caller bound to `tenant_slug`
pub trait CheckScope<Scope, T> {
    fn is_in_scope(&self, tenant_slug: &str, scope: &Scope, obj: Option<&T>) -> bool;
}

/// Allows everything. Used by the scheduler, seeding and public order placement.
pub struct SystemACL<Resource, Action, Scope, Error, T> {
    phantom: PhantomData<(Resource, Action, Scope, Error, T)>,
}

impl<Resource, Action, Scope, Error, T> Default for SystemACL<Resource, Action, Scope, Error, T> {
    fn default() -> Self {
        SystemACL { phantom: PhantomData }
    }
}

impl<Resource, Action, Scope, Error, T> Acl<Resource, Action, Scope, Error, T> for SystemACL<Resource, Action, Scope, Error, T> {
    fn allows(&self, _: Resource, _: Action, _: &dyn CheckScope<Scope, T>, _: Option<&T>) -> Result<bool, Error> {
        Ok(true)
    }
}
