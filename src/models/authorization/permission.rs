//! Permission is a tuple for describing permissions

use super::{Action, Resource, Scope};

pub struct Permission {
    pub resource: Resource,
    pub action: Action,
    pub scope: Scope,
}
