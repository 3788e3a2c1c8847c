//! Campus HTTP transport
//!
//! Typed access to the authentication endpoints and a general API client whose
//! outgoing requests pass through registered interceptors.

pub mod client;
pub mod types;

pub use client::{ApiClient, ClientError, PublicClient, TypedClientBuilder};
