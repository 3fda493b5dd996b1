//! Services is a core layer for the app business logic like
//! validation, authorization, transactions and reconciliation.

pub mod archive;
pub mod auth;
pub mod carousel;
pub mod cash;
pub mod error;
pub mod images;
pub mod orders;
pub mod products;
pub mod tenants;
pub mod types;

pub use self::error::{Error, ErrorKind, ErrorSource};

use crate::controller::context::{DynamicContext, StaticContext};
use crate::db::PooledDbConnection;
use crate::models::AdminIdentity;
use crate::repos::repo_factory::ReposFactory;

use self::types::ServiceFuture;

/// Request scoped facade over the service traits
pub struct Service<F: ReposFactory> {
    pub static_context: StaticContext<F>,
    pub dynamic_context: DynamicContext,
}

impl<F: ReposFactory> Clone for Service<F> {
    fn clone(&self) -> Self {
        Self {
            static_context: self.static_context.clone(),
            dynamic_context: self.dynamic_context.clone(),
        }
    }
}

impl<F: ReposFactory> Service<F> {
    pub fn new(static_context: StaticContext<F>, dynamic_context: DynamicContext) -> Self {
        Self {
            static_context,
            dynamic_context,
        }
    }

    pub fn spawn_on_pool<R, Func>(&self, f: Func) -> ServiceFuture<R>
    where
        Func: FnOnce(PooledDbConnection) -> Result<R, Error> + Send + 'static,
        R: Send + 'static,
    {
        types::spawn_on_pool(self.static_context.db_pool.clone(), self.static_context.cpu_pool.clone(), f)
    }

    pub fn identity(&self) -> Option<AdminIdentity> {
        self.dynamic_context.identity.clone()
    }

    /// Name written to history rows, events and cash movements
    pub fn actor(&self) -> String {
        self.dynamic_context
            .identity
            .as_ref()
            .map(|identity| identity.username.clone())
            .unwrap_or_default()
    }
}
