//! Enum for resources available in ACLs
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Resource {
    Orders,
    CashSessions,
    Archive,
    TenantConfig,
    Products,
    Carousel,
    AdminUsers,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Resource::Orders => write!(f, "orders"),
            Resource::CashSessions => write!(f, "cash sessions"),
            Resource::Archive => write!(f, "archive"),
            Resource::TenantConfig => write!(f, "tenant config"),
            Resource::Products => write!(f, "products"),
            Resource::Carousel => write!(f, "carousel"),
            Resource::AdminUsers => write!(f, "admin users"),
        }
    }
}
