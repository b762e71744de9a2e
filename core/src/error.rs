//! Error types for the harness client.
//!
//! # Design
//! Status-bearing failures (`AuthenticationFailed`, `ProfileFetchFailed`)
//! carry the HTTP status so test bodies can assert on it. Transport errors
//! are wrapped without reinterpretation; the original `reqwest::Error` stays
//! reachable through `source()`, and so does the `serde_json::Error` behind
//! a `Parse` failure.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by `ApiClient`, `AuthManager` and `TestDataManager`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A verb was called before `create_context` or after `dispose`.
    #[error("request context not initialized; call create_context first")]
    ContextNotInitialized,

    /// The login (or refresh) endpoint answered with a non-2xx status.
    #[error("authentication failed with status {status}: {}", .message.as_deref().unwrap_or("no message"))]
    AuthenticationFailed { status: u16, message: Option<String> },

    /// A profile was requested without a live session token.
    #[error("no authenticated user")]
    NoAuthenticatedUser,

    /// The authenticated profile call answered with a non-2xx status.
    #[error("failed to fetch current user profile: status {status}")]
    ProfileFetchFailed { status: u16 },

    /// Connection, TLS or protocol failure from the HTTP transport.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body (or a value in the store) was not the expected JSON.
    /// `excerpt` holds the start of the raw body when one was available.
    #[error("failed to parse response body: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
        excerpt: Option<String>,
    },

    /// A 2xx token response carried neither `accessToken` nor `token`.
    #[error("response with status {status} carried no access token")]
    MissingToken { status: u16 },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// A configured header name or value is not valid HTTP.
    #[error("invalid header {0}")]
    InvalidHeader(String),
}

impl ApiError {
    /// A `Parse` error for a decoded value with no raw body behind it.
    pub fn parse(source: serde_json::Error) -> Self {
        Self::Parse {
            source,
            excerpt: None,
        }
    }
}
