use futures::Future;
use futures_cpupool::CpuPool;

use super::error::{Error, ErrorKind, ErrorSource};
use crate::db::{DbPool, PooledDbConnection};
use failure::Fail;

/// Service layer Future
pub type ServiceFuture<T> = Box<dyn Future<Item = T, Error = Error>>;

pub type ServiceResult<T> = Result<T, Error>;

/// Runs blocking database work on the cpu pool with a pooled connection
pub fn spawn_on_pool<R, Func>(db_pool: DbPool, cpu_pool: CpuPool, f: Func) -> ServiceFuture<R>
where
    Func: FnOnce(PooledDbConnection) -> Result<R, Error> + Send + 'static,
    R: Send + 'static,
{
    Box::new(cpu_pool.spawn_fn(move || db_pool.get().map_err(ectx!(ErrorSource::R2d2, ErrorKind::Internal)).and_then(f)))
}
