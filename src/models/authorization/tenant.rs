use derive_more::{Display, From};

/// Tenant a row belongs to, the object repo ACLs check ownership against
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash, From, Serialize, Deserialize)]
pub struct TenantSlug(String);

impl TenantSlug {
    pub fn new<S: Into<String>>(slug: S) -> Self {
        TenantSlug(slug.into())
    }

    pub fn inner(&self) -> &str {
        &self.0
    }
}
