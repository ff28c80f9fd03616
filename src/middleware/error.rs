use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::allowlist::DenialReason;

/// HTTP-facing authentication and authorization failures.
///
/// Every variant terminates the request. None of them lets an unauthenticated caller through.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credential was presented.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// A bearer key failed validation, or the session cookie is expired, unknown or unreadable.
    #[error("Invalid credential")]
    InvalidCredential,

    /// Authenticated, but the allow-list refused the principal.
    #[error("Not authorized: {0}")]
    AuthorizationDenied(DenialReason),

    /// Upstream OAuth failure: network, timeout, bad response, state mismatch.
    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    /// Session store failure.
    #[error("Session store error: {0}")]
    Session(String),

    /// API key registry failure.
    #[error("API key registry error: {0}")]
    Registry(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::AuthenticationRequired | Self::InvalidCredential | Self::IdentityProvider(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::AuthorizationDenied(_) => StatusCode::FORBIDDEN,
            Self::Session(_) | Self::Registry(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub(super) fn session(e: crate::error::Error) -> Self {
        Self::Session(e.to_string())
    }

    pub(super) fn registry(e: crate::error::Error) -> Self {
        Self::Registry(e.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::AuthenticationRequired => {
                json!({ "error": "Authentication or valid API key required" })
            }
            Self::InvalidCredential => json!({ "error": "Invalid or expired credential" }),
            Self::AuthorizationDenied(reason) => {
                tracing::warn!(reason = reason.code(), "Authorization denied");
                json!({ "error": "Not authorized", "reason": reason.code() })
            }
            Self::IdentityProvider(detail) => {
                tracing::error!(error = %detail, "Identity provider failure");
                json!({ "error": "Authentication failed", "reason": "identity_provider_error" })
            }
            Self::Session(_) | Self::Registry(_) | Self::Config(_) => {
                tracing::error!(error = %self, "Auth internal error");
                json!({ "error": "Internal error" })
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<crate::error::Error> for AuthError {
    fn from(e: crate::error::Error) -> Self {
        use crate::error::Error;
        match e {
            Error::Session(_) => Self::session(e),
            Error::Registry(_) => Self::registry(e),
            _ => Self::IdentityProvider(e.to_string()),
        }
    }
}
