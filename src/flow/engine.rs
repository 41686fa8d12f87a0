//! Flow state machine
//!
//! At most one flow is active. Starting a flow while another is active
//! aborts the old one and replaces it; state is never merged. A flow ends
//! in exactly one of two ways: it completes and yields a command, or it
//! aborts. Either way its state is dropped.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Channel, FlowId, FlowKind};

/// Stage of a message-composition flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStage {
    AwaitingRecipient,
    AwaitingBody,
    Ready,
}

impl FlowStage {
    fn next(self) -> Self {
        match self {
            FlowStage::AwaitingRecipient => FlowStage::AwaitingBody,
            FlowStage::AwaitingBody | FlowStage::Ready => FlowStage::Ready,
        }
    }
}

/// Per-channel deadlines and the failure budget for a stage
#[derive(Debug, Clone)]
pub struct FlowLimits {
    pub voice_stage_timeout: Duration,
    pub text_stage_timeout: Duration,
    /// Consecutive recognition failures in one stage before aborting
    pub max_recognition_failures: u8,
}

impl FlowLimits {
    fn stage_timeout(&self, channel: Channel) -> Duration {
        match channel {
            Channel::Voice => self.voice_stage_timeout,
            Channel::Text => self.text_stage_timeout,
        }
    }
}

impl Default for FlowLimits {
    fn default() -> Self {
        Self {
            voice_stage_timeout: Duration::from_secs(30),
            text_stage_timeout: Duration::from_secs(120),
            max_recognition_failures: 2,
        }
    }
}

/// State of the active flow
#[derive(Debug, Clone)]
pub struct FlowState {
    pub id: FlowId,
    pub kind: FlowKind,
    /// Channel that started the flow and owns its input
    pub channel: Channel,
    pub stage: FlowStage,
    /// Answers gathered so far, keyed by the stage that asked for them
    pub collected: BTreeMap<FlowStage, String>,
    failed_attempts: u8,
    stage_deadline: Instant,
}

impl FlowState {
    fn prompt(&self) -> String {
        match self.stage {
            FlowStage::AwaitingRecipient => "Who should I send the message to?".to_string(),
            FlowStage::AwaitingBody => {
                let recipient = self
                    .collected
                    .get(&FlowStage::AwaitingRecipient)
                    .map(String::as_str)
                    .unwrap_or("them");
                format!("What message should I send to {recipient}?")
            }
            FlowStage::Ready => "Sending your message.".to_string(),
        }
    }

    fn into_command(mut self) -> CompletedCommand {
        match self.kind {
            FlowKind::SendMessage => CompletedCommand::SendMessage {
                recipient: self
                    .collected
                    .remove(&FlowStage::AwaitingRecipient)
                    .unwrap_or_default(),
                body: self
                    .collected
                    .remove(&FlowStage::AwaitingBody)
                    .unwrap_or_default(),
            },
        }
    }
}

/// Command produced by a completed flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletedCommand {
    SendMessage { recipient: String, body: String },
}

/// Why a flow was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// No answer arrived before the stage deadline
    Timeout,
    /// Recognition failed on consecutive attempts
    Unrecognized,
    /// Another flow was started
    Replaced,
    /// The daemon is stopping
    Shutdown,
}

impl AbortReason {
    /// Message shown or spoken to the user
    pub fn user_message(&self) -> &'static str {
        match self {
            AbortReason::Timeout => "Listening timeout - please try again",
            AbortReason::Unrecognized => "Could not understand audio - please try again",
            AbortReason::Replaced => "Cancelled the previous message",
            AbortReason::Shutdown => "Message cancelled",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Timeout => write!(f, "timeout"),
            AbortReason::Unrecognized => write!(f, "unrecognized"),
            AbortReason::Replaced => write!(f, "replaced"),
            AbortReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Result of starting a flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowStarted {
    pub flow_id: FlowId,
    /// First question to ask
    pub prompt: String,
    /// Flow that was aborted to make room, if any
    pub replaced: Option<FlowId>,
}

/// Result of feeding a flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Flow continues; ask this next
    Prompt { flow_id: FlowId, text: String },
    /// Flow reached Ready and was destroyed
    Completed {
        flow_id: FlowId,
        command: CompletedCommand,
    },
    /// Flow was abandoned and destroyed
    Aborted { flow_id: FlowId, reason: AbortReason },
}

impl FlowOutcome {
    /// True once the flow no longer exists
    pub fn is_finished(&self) -> bool {
        !matches!(self, FlowOutcome::Prompt { .. })
    }
}

/// Errors from addressing a flow that is not active
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("no flow is active")]
    NoActiveFlow,

    #[error("{0} is not the active flow")]
    UnknownFlow(FlowId),
}

/// An abort the owning channel has not been told about yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortNotice {
    pub flow_id: FlowId,
    pub reason: AbortReason,
}

/// Owner of the single active flow
#[derive(Debug)]
pub struct FlowEngine {
    active: Option<FlowState>,
    next_id: u64,
    limits: FlowLimits,
    /// At most one pending notice per channel
    notices: Vec<(Channel, AbortNotice)>,
}

impl FlowEngine {
    pub fn new(limits: FlowLimits) -> Self {
        Self {
            active: None,
            next_id: 1,
            limits,
            notices: Vec::new(),
        }
    }

    pub fn active(&self) -> Option<&FlowState> {
        self.active.as_ref()
    }

    /// Id of the active flow if `channel` owns it
    pub fn active_for(&self, channel: Channel) -> Option<FlowId> {
        self.active
            .as_ref()
            .filter(|state| state.channel == channel)
            .map(|state| state.id)
    }

    /// Start a flow, aborting any flow already in progress
    ///
    /// A flow replaced from another channel leaves a notice for its owner.
    pub fn start(&mut self, kind: FlowKind, channel: Channel, now: Instant) -> FlowStarted {
        let replaced = self.active.take().map(|old| {
            warn!(
                flow = %old.id,
                stage = ?old.stage,
                reason = %AbortReason::Replaced,
                "flow aborted"
            );
            if old.channel != channel {
                self.leave_notice(old.channel, old.id, AbortReason::Replaced);
            }
            old.id
        });

        let id = FlowId(self.next_id);
        self.next_id += 1;

        let state = FlowState {
            id,
            kind,
            channel,
            stage: FlowStage::AwaitingRecipient,
            collected: BTreeMap::new(),
            failed_attempts: 0,
            stage_deadline: now + self.limits.stage_timeout(channel),
        };
        let prompt = state.prompt();
        self.active = Some(state);

        info!(flow = %id, ?kind, %channel, "flow started");

        FlowStarted {
            flow_id: id,
            prompt,
            replaced,
        }
    }

    /// Feed one utterance into the active flow
    ///
    /// Blank input counts as a recognition failure. Input arriving after the
    /// stage deadline aborts the flow.
    pub fn advance(
        &mut self,
        flow_id: FlowId,
        input: &str,
        now: Instant,
    ) -> Result<FlowOutcome, FlowError> {
        let timeout = self.limits.stage_timeout(self.checked(flow_id)?.channel);

        if now > self.checked(flow_id)?.stage_deadline {
            return Ok(self.finish_aborted(AbortReason::Timeout));
        }

        let input = input.trim();
        if input.is_empty() {
            return self.recognition_failed(flow_id, now);
        }

        let state = self.checked_mut(flow_id)?;
        state.collected.insert(state.stage, input.to_string());
        state.stage = state.stage.next();
        state.failed_attempts = 0;
        state.stage_deadline = now + timeout;
        debug!(flow = %flow_id, stage = ?state.stage, "flow advanced");

        if state.stage == FlowStage::Ready {
            let Some(state) = self.active.take() else {
                return Err(FlowError::NoActiveFlow);
            };
            info!(flow = %flow_id, "flow completed");
            return Ok(FlowOutcome::Completed {
                flow_id,
                command: state.into_command(),
            });
        }

        Ok(FlowOutcome::Prompt {
            flow_id,
            text: state.prompt(),
        })
    }

    /// Record a failed recognition for the current stage
    ///
    /// The first failure re-asks the question; reaching the failure budget
    /// aborts the flow.
    pub fn recognition_failed(
        &mut self,
        flow_id: FlowId,
        now: Instant,
    ) -> Result<FlowOutcome, FlowError> {
        let timeout = self.limits.stage_timeout(self.checked(flow_id)?.channel);
        let max_failures = self.limits.max_recognition_failures;
        let state = self.checked_mut(flow_id)?;
        state.failed_attempts += 1;

        if state.failed_attempts >= max_failures {
            return Ok(self.finish_aborted(AbortReason::Unrecognized));
        }

        state.stage_deadline = now + timeout;
        debug!(flow = %flow_id, attempts = state.failed_attempts, "flow re-prompting");

        Ok(FlowOutcome::Prompt {
            flow_id,
            text: format!("Sorry, I didn't catch that. {}", state.prompt()),
        })
    }

    /// Abort the flow because its stage wait expired
    pub fn time_out(&mut self, flow_id: FlowId) -> Result<FlowOutcome, FlowError> {
        self.checked(flow_id)?;
        Ok(self.finish_aborted(AbortReason::Timeout))
    }

    /// Abort whatever flow is active
    pub fn abort(&mut self, reason: AbortReason) -> Option<FlowOutcome> {
        self.active.as_ref()?;
        Some(self.finish_aborted(reason))
    }

    /// Abort the active flow if its deadline has passed
    ///
    /// The owning channel gets a notice, since nobody is waiting on the
    /// outcome.
    pub fn expire(&mut self, now: Instant) -> Option<FlowOutcome> {
        let (channel, flow_id) = self
            .active
            .as_ref()
            .filter(|state| now > state.stage_deadline)
            .map(|state| (state.channel, state.id))?;
        self.leave_notice(channel, flow_id, AbortReason::Timeout);
        self.abort(AbortReason::Timeout)
    }

    /// Take the pending abort notice for `channel`
    pub fn take_notice(&mut self, channel: Channel) -> Option<AbortNotice> {
        let index = self.notices.iter().position(|(owner, _)| *owner == channel)?;
        Some(self.notices.remove(index).1)
    }

    fn leave_notice(&mut self, channel: Channel, flow_id: FlowId, reason: AbortReason) {
        self.notices.retain(|(owner, _)| *owner != channel);
        self.notices.push((channel, AbortNotice { flow_id, reason }));
    }

    fn finish_aborted(&mut self, reason: AbortReason) -> FlowOutcome {
        let flow_id = match self.active.take() {
            Some(state) => {
                warn!(flow = %state.id, stage = ?state.stage, %reason, "flow aborted");
                state.id
            }
            None => FlowId(0),
        };
        FlowOutcome::Aborted { flow_id, reason }
    }

    fn checked(&self, flow_id: FlowId) -> Result<&FlowState, FlowError> {
        match &self.active {
            Some(state) if state.id == flow_id => Ok(state),
            Some(_) => Err(FlowError::UnknownFlow(flow_id)),
            None => Err(FlowError::NoActiveFlow),
        }
    }

    fn checked_mut(&mut self, flow_id: FlowId) -> Result<&mut FlowState, FlowError> {
        match &mut self.active {
            Some(state) if state.id == flow_id => Ok(state),
            Some(_) => Err(FlowError::UnknownFlow(flow_id)),
            None => Err(FlowError::NoActiveFlow),
        }
    }
}

impl Default for FlowEngine {
    fn default() -> Self {
        Self::new(FlowLimits::default())
    }
}
