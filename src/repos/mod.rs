//! Repos is a module responsible for interacting with the database

#[macro_use]
pub mod acl;
pub mod admin_users;
pub mod archive;
pub mod carousel;
pub mod cash_movements;
pub mod cash_sessions;
pub mod error;
pub mod legacy_acl;
pub mod order_events;
pub mod order_history;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod repo_factory;
pub mod tenant_config;
pub mod types;

pub use self::acl::*;
pub use self::admin_users::*;
pub use self::archive::{ArchiveRepo, ArchiveRepoImpl};
pub use self::carousel::{CarouselRepo, CarouselRepoImpl};
pub use self::cash_movements::*;
pub use self::cash_sessions::*;
pub use self::error::*;
pub use self::order_events::*;
pub use self::order_history::*;
pub use self::order_items::*;
pub use self::orders::{OrdersRepo, OrdersRepoImpl};
pub use self::products::{ProductsRepo, ProductsRepoImpl, Upserted};
pub use self::repo_factory::*;
pub use self::tenant_config::*;
pub use self::types::*;
