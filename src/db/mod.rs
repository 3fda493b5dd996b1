//! Database access: a connection that speaks SQLite and Postgres from the same SQL,
//! its r2d2 manager, schema bootstrap and seeding.

#[macro_use]
pub mod connection;
pub mod dialect;
pub mod manager;
pub mod schema;
pub mod seed;

pub use self::connection::{DbConnection, Param};
pub use self::dialect::{translate, Backend};
pub use self::manager::DbConnectionManager;
pub use self::schema::bootstrap;

pub type DbPool = r2d2::Pool<DbConnectionManager>;
pub type PooledDbConnection = r2d2::PooledConnection<DbConnectionManager>;
