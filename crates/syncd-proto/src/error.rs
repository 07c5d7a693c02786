//! Error types for token and identifier parsing.

use thiserror::Error;

/// Errors produced when decoding a [`StreamingToken`](crate::StreamingToken)
/// from its wire string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TokenError {
    /// The token string was empty.
    #[error("empty sync token")]
    Empty,

    /// The token did not start with the streaming token marker.
    #[error("sync token {0:?} has an unknown prefix")]
    UnknownPrefix(String),

    /// The token carried no positions after its prefix.
    #[error("sync token has no positions")]
    NoPositions,

    /// One of the position components was not an unsigned integer.
    #[error("invalid position {value:?} at index {index}")]
    InvalidPosition {
        /// Zero-based component index.
        index: usize,
        /// Offending component text.
        value: String,
    },
}

/// Errors produced when validating an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum IdError {
    /// The identifier was empty.
    #[error("empty {kind}")]
    Empty {
        /// Identifier kind ("room ID", "user ID", ...).
        kind: &'static str,
    },

    /// The identifier did not start with its required sigil.
    #[error("{kind} {value:?} must start with '{sigil}'")]
    MissingSigil {
        /// Identifier kind.
        kind: &'static str,
        /// Required leading character.
        sigil: char,
        /// Offending value.
        value: String,
    },

    /// The identifier had no `:server` part.
    #[error("{kind} {value:?} is missing a server name")]
    MissingServerName {
        /// Identifier kind.
        kind: &'static str,
        /// Offending value.
        value: String,
    },
}
