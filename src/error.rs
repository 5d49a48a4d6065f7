//! Error types for the cache cluster
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache cluster.
///
/// The enum is `Clone` because the single-flight coalescer delivers the
/// leader's error verbatim to every waiting caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Empty key at a group or RPC entry point
    #[error("key is required")]
    KeyRequired,

    /// RPC referred to an unknown group name
    #[error("group not found: {0}")]
    GroupNotFound(String),

    /// Key has no value in the backing data source
    #[error("key not found: {0}")]
    NotFound(String),

    /// The user-supplied loader failed
    #[error("loader failed: {0}")]
    LoaderFailed(String),

    /// Remote peer could not be reached or answered garbage
    #[error("peer unavailable: {0}")]
    PeerUnavailable(String),

    /// Service registry failure
    #[error("registry error: {0}")]
    Registry(String),

    /// Start was called on a running server
    #[error("server already started")]
    AlreadyStarted,

    /// Invalid configuration at construction time
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::KeyRequired => StatusCode::BAD_REQUEST,
            CacheError::GroupNotFound(_) => StatusCode::NOT_FOUND,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::LoaderFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::PeerUnavailable(_) => StatusCode::BAD_GATEWAY,
            CacheError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::AlreadyStarted => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache cluster.
pub type Result<T> = std::result::Result<T, CacheError>;
