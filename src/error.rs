//! Unified error handling for syncd-ng.
//!
//! This module provides the error hierarchy for the sync engine, with
//! automatic conversions and metric labeling. Storage errors live in
//! [`crate::db::DbError`], configuration errors in [`crate::config::ConfigError`].

use crate::db::DbError;
use syncd_proto::TokenError;
use thiserror::Error;

// ============================================================================
// Sync Errors (request path)
// ============================================================================

/// Errors returned to a single sync request.
///
/// None of these move a stream position; a failed request can be retried
/// with the same since token.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("storage error: {0}")]
    Storage(#[from] DbError),

    #[error("invalid since token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("request canceled")]
    Canceled,
}

impl SyncError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Storage(e) => e.error_code(),
            Self::InvalidToken(_) => "invalid_token",
            Self::Canceled => "canceled",
        }
    }
}

// ============================================================================
// Consumer Errors (bus message handling)
// ============================================================================

/// Errors raised while handling one bus message.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The message can never be processed; it is acknowledged and dropped.
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

impl ConsumerError {
    /// Shorthand for a missing required header.
    pub fn missing_header(name: &str) -> Self {
        Self::Malformed(format!("missing header {name:?}"))
    }

    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<serde_json::Error> for ConsumerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<syncd_proto::IdError> for ConsumerError {
    fn from(err: syncd_proto::IdError) -> Self {
        Self::Malformed(err.to_string())
    }
}

// ============================================================================
// Startup Errors
// ============================================================================

/// Errors that abort process startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read stream positions: {0}")]
    Snapshot(#[from] DbError),

    #[error("startup canceled")]
    Canceled,
}

impl StartupError {
    /// Get a static error code string for metrics labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "snapshot",
            Self::Canceled => "canceled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_error_codes_delegate_to_storage() {
        let err = SyncError::from(DbError::Serialization("boom".into()));
        assert_eq!(err.error_code(), "serialization");
        assert_eq!(SyncError::Canceled.error_code(), "canceled");
    }

    #[test]
    fn bad_json_is_malformed() {
        let err: ConsumerError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.error_code(), "malformed");
    }

    #[test]
    fn missing_header_names_the_header() {
        let err = ConsumerError::missing_header("room_id");
        assert!(err.to_string().contains("room_id"));
    }
}
