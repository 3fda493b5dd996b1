//! Models contains all structures that are used in different
//! modules of the app

pub mod admin_user;
pub mod archive;
pub mod authorization;
pub mod carousel;
pub mod cash;
pub mod order;
pub mod product;
pub mod tenant_config;
pub mod time;
pub mod value;

pub use self::admin_user::*;
pub use self::archive::*;
pub use self::authorization::*;
pub use self::carousel::*;
pub use self::cash::*;
pub use self::order::*;
pub use self::product::*;
pub use self::tenant_config::*;
