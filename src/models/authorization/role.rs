//! Enum for roles available in ACLs

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Logged in without a tenant, only possible through the dev login
    Superadmin,
    /// Staff of one tenant
    Admin,
    /// Anonymous storefront visitor
    Guest,
}
