//! Authentication error taxonomy shared by every Campus crate

/// Standard result type for session operations
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Errors surfaced by the authentication session layer
///
/// The type is `Clone` because a single refresh outcome is handed to every
/// caller that joined the in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Login rejected by the backend; retry with different input
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    /// Refresh token expired or revoked; the session is over
    #[error("Invalid refresh token: {message}")]
    InvalidRefreshToken { message: String },

    /// Network failure or server fault; the session is left untouched
    #[error("Authentication service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// Durable token storage is disabled, full or broken
    #[error("Token storage unavailable: {message}")]
    StorageUnavailable { message: String },

    /// Operation requires credentials that the session does not hold
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The session was logged out or replaced while the operation was in flight
    #[error("Session changed while the request was in flight")]
    SessionChanged,
}

impl AuthError {
    /// Create an invalid credentials error
    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        Self::InvalidCredentials {
            message: message.into(),
        }
    }

    /// Create an invalid refresh token error
    pub fn invalid_refresh_token(message: impl Into<String>) -> Self {
        Self::InvalidRefreshToken {
            message: message.into(),
        }
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Create a storage unavailable error
    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    /// Whether retrying the same operation later may succeed
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. } | Self::SessionChanged)
    }

    /// Whether this error ends the current session
    pub const fn ends_session(&self) -> bool {
        matches!(self, Self::InvalidRefreshToken { .. })
    }

    /// Text suitable for showing to the user
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials { .. } => "Invalid username or password.",
            Self::InvalidRefreshToken { .. } => "Your session has expired. Please log in again.",
            Self::ServiceUnavailable { .. } => {
                "The server could not be reached. Please try again in a moment."
            }
            Self::StorageUnavailable { .. } => {
                "Your session will not be remembered after closing the application."
            }
            Self::NotAuthenticated => "Please log in to continue.",
            Self::SessionChanged => "Your session changed. Please try again.",
        }
    }
}
