pub mod auth;

pub use auth::{AuthService, HttpAuthService, RefreshGrant, TokenGrant};
