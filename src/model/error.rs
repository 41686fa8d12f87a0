//! Completion error types

use thiserror::Error;

/// Failure of a single completion attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Provider answered with a non-success HTTP status
    #[error("completion provider returned HTTP {0}")]
    UpstreamStatus(u16),

    /// Request never produced a response (connect failure, timeout)
    #[error("completion transport failed: {0}")]
    Transport(String),

    /// Response body could not be understood
    #[error("malformed completion response: {0}")]
    Decode(String),
}

