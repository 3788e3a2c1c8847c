//! Campus core types and utilities

pub mod access;
pub mod error;
pub mod types;

pub use access::{RoleSet, RouteRule, RouteTable, can_access};
pub use error::{AuthError, AuthResult};
pub use types::{Role, TokenPair, User};
