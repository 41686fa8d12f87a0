//! Recognized-speech input
//!
//! The dispatch loop pulls utterances from an [`InputSource`]. A wait that
//! ends without speech is a normal outcome, not a failure, so the error type
//! separates timeouts from recognition and transport problems.

mod stdin;

use std::time::Duration;

use async_trait::async_trait;

pub use stdin::StdinInput;

/// Why a listen produced no text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListenError {
    #[error("no speech before timeout")]
    Timeout,

    #[error("speech was not recognized")]
    Unrecognized,

    #[error("recognizer transport failed: {0}")]
    Transport(String),
}

/// Source of recognized utterances
#[async_trait]
pub trait InputSource: Send {
    /// Wait up to `timeout` for speech and return its text
    ///
    /// `phrase_limit` bounds how long a single phrase may run once started.
    async fn listen(&mut self, timeout: Duration, phrase_limit: Duration)
        -> Result<String, ListenError>;
}
