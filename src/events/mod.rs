//! Events module for dispatch transitions
//!
//! Structured events for phase changes, handled commands, and the
//! lifecycle of multi-turn flows. Broadcast to anyone interested (the HTTP
//! status view keeps its phase in sync from these).

use serde::{Deserialize, Serialize};

use crate::classifier::ActionKind;
use crate::dispatch::Phase;
use crate::flow::{AbortReason, Channel, FlowId, FlowKind};

/// Events emitted while handling utterances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantEvent {
    /// Voice loop changed phase
    PhaseChanged { from: Phase, to: Phase },

    /// Voice loop started or stopped listening
    ListeningChanged { listening: bool },

    /// An utterance was routed and answered
    CommandHandled {
        channel: Channel,
        action: ActionKind,
        /// Time from utterance to reply in milliseconds
        duration_ms: u64,
    },

    /// A multi-turn flow began
    FlowStarted { flow_id: FlowId, kind: FlowKind },

    /// A flow collected everything it needed
    FlowCompleted { flow_id: FlowId },

    /// A flow was abandoned
    FlowAborted { flow_id: FlowId, reason: AbortReason },

    /// Consecutive recognition failures hit the threshold and were reset
    RecognitionReset { failures: u32 },
}

impl std::fmt::Display for AssistantEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssistantEvent::PhaseChanged { from, to } => {
                write!(f, "PHASE_CHANGED ({from} -> {to})")
            }
            AssistantEvent::ListeningChanged { listening } => {
                write!(f, "LISTENING_CHANGED ({listening})")
            }
            AssistantEvent::CommandHandled {
                channel,
                action,
                duration_ms,
            } => write!(f, "COMMAND_HANDLED ({channel} {action}, {duration_ms}ms)"),
            AssistantEvent::FlowStarted { flow_id, .. } => write!(f, "FLOW_STARTED ({flow_id})"),
            AssistantEvent::FlowCompleted { flow_id } => write!(f, "FLOW_COMPLETED ({flow_id})"),
            AssistantEvent::FlowAborted { flow_id, reason } => {
                write!(f, "FLOW_ABORTED ({flow_id}, {reason})")
            }
            AssistantEvent::RecognitionReset { failures } => {
                write!(f, "RECOGNITION_RESET ({failures})")
            }
        }
    }
}
