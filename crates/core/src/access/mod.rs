//! Role-based route authorization

mod routes;

pub use routes::{PathPattern, PatternError, RouteRule, RouteTable};

use crate::types::{Role, User};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Set of roles allowed to open a route
///
/// An empty set admits any authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    /// Any authenticated user
    pub const fn any() -> Self {
        Self(BTreeSet::new())
    }

    pub fn only(role: Role) -> Self {
        Self(BTreeSet::from([role]))
    }

    pub fn is_any(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// Whether a user holding `role` satisfies this set
    pub fn admits(&self, role: Role) -> bool {
        self.is_any() || self.contains(role)
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Role; N]> for RoleSet {
    fn from(roles: [Role; N]) -> Self {
        roles.into_iter().collect()
    }
}

/// Capability check used by the routing layer
///
/// Without a profile only an open role set can be satisfied.
pub fn can_access(user: Option<&User>, required_roles: &RoleSet) -> bool {
    if required_roles.is_any() {
        return true;
    }
    user.is_some_and(|user| required_roles.contains(user.role))
}
