//! Chat API message definitions
//!
//! All bodies are JSON. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::dispatch::Phase;
use crate::flow::{Channel, FlowId, FlowKind, FlowStage, FlowState};

/// Body of `POST /chat`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

/// Reply to `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Reply to `GET /status`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Whether the voice loop is running
    pub listening: bool,
    /// Current time, RFC 3339
    pub server_time: String,
    /// Phase of the voice loop
    pub phase: Phase,
    pub active_flow: Option<ActiveFlow>,
    pub uptime_secs: u64,
}

/// Summary of the flow in progress
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveFlow {
    pub id: FlowId,
    pub kind: FlowKind,
    pub channel: Channel,
    pub stage: FlowStage,
}

impl From<&FlowState> for ActiveFlow {
    fn from(state: &FlowState) -> Self {
        Self {
            id: state.id,
            kind: state.kind,
            channel: state.channel,
            stage: state.stage,
        }
    }
}

/// Body of every error reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
