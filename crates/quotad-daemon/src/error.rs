//! Error types for the request handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors a request can end with.
///
/// The `Display` text is the response body. Users read these bodies in
/// their terminal, so they carry full sentences and, for quota refusals,
/// the figures behind the decision.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The credential failed verification, lacked a mandatory identity
    /// field, or was sealed outside the trusted network.
    #[error("Failed to authenticate request: {reason}")]
    Unauthenticated {
        /// Why the credential was refused.
        reason: String,
    },

    /// The caller spent their request budget.
    #[error("You have sent too many requests recently. Please slow down.")]
    RateLimited,

    /// The request was understood and refused; the message says why.
    #[error("{message}")]
    BadRequest {
        /// Full response body.
        message: String,
    },

    /// An admitted operation failed against the backend.
    #[error("{message}")]
    Internal {
        /// Full response body.
        message: String,
    },
}

impl ApiError {
    /// Refusal with the given body.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Backend failure with the given body.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the HTTP status code for this error.
    ///
    /// - Unauthenticated: 401 Unauthorized
    /// - Rate limited: 429 Too Many Requests
    /// - Refused requests: 400 Bad Request
    /// - Backend failures: 500 Internal Server Error
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "request failed");
        } else {
            tracing::debug!(%status, error = %self, "request refused");
        }
        (status, format!("{self}\n")).into_response()
    }
}
