//! Multi-turn flows
//!
//! A flow collects several utterances before anything is executed. The only
//! flow today is message composition:
//! - AwaitingRecipient: asked who to message
//! - AwaitingBody: asked what to send
//! - Ready: both collected, handed off and destroyed

mod engine;

pub use engine::{
    AbortReason, CompletedCommand, FlowEngine, FlowLimits, FlowOutcome, FlowStage, FlowState,
};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a single flow instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowId(pub u64);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flow-{}", self.0)
    }
}

/// Kind of multi-turn flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// Compose and send a chat message
    SendMessage,
}

/// Where an utterance came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Spoken through the dispatch loop
    Voice,
    /// Typed through the chat API
    Text,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Voice => write!(f, "voice"),
            Channel::Text => write!(f, "text"),
        }
    }
}
