//! Enum for scopes available in ACLs

#[derive(PartialEq, Eq)]
pub enum Scope {
    /// Rows of any tenant
    All,

    /// Rows whose tenant is the tenant of the current admin
    Owned,
}
