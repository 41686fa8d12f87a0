//! Command handling shared by the voice loop and the chat API
//!
//! Routing happens under the flow lock and never awaits; the executor,
//! messenger, and model calls run after the lock is released.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::classifier::{classify, Action, ActionKind, LocalCommand};
use crate::context::AssistantContext;
use crate::events::AssistantEvent;
use crate::flow::{AbortReason, Channel, CompletedCommand, FlowEngine, FlowId, FlowOutcome};

/// Reply to an empty utterance
pub const EMPTY_INPUT_REPLY: &str = "Please say something";

/// Reply when the model call fails
pub const MODEL_FAILURE_REPLY: &str = "Sorry, I'm having trouble answering right now";

const MESSAGE_SENT_REPLY: &str = "Message sent successfully";
const MESSAGE_FAILED_REPLY: &str = "Sorry, I couldn't send the message";

/// Text to give back to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// What the utterance was routed to, `None` when nothing ran
    pub action: Option<ActionKind>,
    /// The channel's flow is still waiting for another answer
    pub flow_pending: bool,
}

impl Reply {
    fn new(text: impl Into<String>, action: Option<ActionKind>) -> Self {
        Self {
            text: text.into(),
            action,
            flow_pending: false,
        }
    }

    fn pending(text: impl Into<String>, action: ActionKind) -> Self {
        Self {
            text: text.into(),
            action: Some(action),
            flow_pending: true,
        }
    }
}

/// Work decided under the flow lock
enum Routed {
    Done(Reply),
    Execute(LocalCommand),
    Deliver {
        flow_id: FlowId,
        recipient: String,
        body: String,
    },
    Query(String),
}

/// Routes utterances to executors, flows, or the model
#[derive(Clone)]
pub struct CommandHandler {
    ctx: Arc<AssistantContext>,
}

impl CommandHandler {
    pub fn new(ctx: Arc<AssistantContext>) -> Self {
        Self { ctx }
    }

    /// Handle one utterance from `channel`
    pub async fn handle(&self, channel: Channel, text: &str) -> Reply {
        let started = Instant::now();
        debug!(%channel, text, "handling utterance");

        let reply = match self.route(channel, text, started) {
            Routed::Done(reply) => reply,
            Routed::Execute(command) => {
                let kind = command.kind();
                let text = match self.ctx.executor.execute(&command).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, action = %kind, "system action failed");
                        e.user_message()
                    }
                };
                Reply::new(text, Some(kind))
            }
            Routed::Deliver {
                flow_id,
                recipient,
                body,
            } => {
                let text = match self.ctx.messenger.send(&recipient, &body).await {
                    Ok(()) => {
                        info!(flow = %flow_id, recipient = %recipient, "message sent");
                        MESSAGE_SENT_REPLY
                    }
                    Err(e) => {
                        warn!(flow = %flow_id, error = %e, "message delivery failed");
                        MESSAGE_FAILED_REPLY
                    }
                };
                Reply::new(text, Some(ActionKind::FlowContinue))
            }
            Routed::Query(query) => {
                let text = match self.ctx.model.ask(&self.ctx.memory, &query).await {
                    Ok(reply) => match channel {
                        Channel::Voice => truncate_chars(&reply, self.ctx.voice_reply_limit),
                        Channel::Text => reply,
                    },
                    Err(_) => MODEL_FAILURE_REPLY.to_string(),
                };
                Reply::new(text, Some(ActionKind::Query))
            }
        };

        if let Some(action) = reply.action {
            let duration_ms = started.elapsed().as_millis() as u64;
            info!(%channel, %action, duration_ms, "command handled");
            self.ctx.emit(AssistantEvent::CommandHandled {
                channel,
                action,
                duration_ms,
            });
        }

        reply
    }

    /// Abort the channel's flow because its answer never arrived
    ///
    /// Returns the message to give the user, `None` when the channel had no
    /// flow.
    pub fn flow_timed_out(&self, channel: Channel) -> Option<String> {
        let mut flows = self.ctx.flows();
        let flow_id = flows.active_for(channel)?;
        let outcome = flows.time_out(flow_id).ok()?;
        self.report(&outcome);
        Some(outcome_text(outcome))
    }

    /// Count a failed recognition against the channel's flow
    pub fn flow_recognition_failed(&self, channel: Channel) -> Option<Reply> {
        let mut flows = self.ctx.flows();
        let flow_id = flows.active_for(channel)?;
        let outcome = flows.recognition_failed(flow_id, Instant::now()).ok()?;
        self.report(&outcome);

        let pending = !outcome.is_finished();
        let text = outcome_text(outcome);
        Some(if pending {
            Reply::pending(text, ActionKind::FlowContinue)
        } else {
            Reply::new(text, Some(ActionKind::FlowContinue))
        })
    }

    /// Abort the channel's flow for `reason`
    pub fn abort_flow(&self, channel: Channel, reason: AbortReason) -> Option<String> {
        let mut flows = self.ctx.flows();
        flows.active_for(channel)?;
        let outcome = flows.abort(reason)?;
        self.report(&outcome);
        Some(outcome_text(outcome))
    }

    /// Message for a flow of `channel` that was replaced or expired elsewhere
    pub fn take_notice(&self, channel: Channel) -> Option<String> {
        let notice = self.ctx.flows().take_notice(channel)?;
        Some(notice.reason.user_message().to_string())
    }

    /// Whether `channel` owns the active flow
    pub fn has_flow(&self, channel: Channel) -> bool {
        self.ctx.flows().active_for(channel).is_some()
    }

    fn route(&self, channel: Channel, text: &str, now: Instant) -> Routed {
        let mut flows = self.ctx.flows();

        if let Some(outcome) = flows.expire(now) {
            self.report(&outcome);
        }

        // The owner of a flow that ended elsewhere hears why before anything else
        if let Some(notice) = flows.take_notice(channel) {
            debug!(flow_id = %notice.flow_id, reason = %notice.reason, "flow ended off-turn");
            return Routed::Done(Reply::new(
                notice.reason.user_message(),
                Some(ActionKind::FlowContinue),
            ));
        }

        let action = match flows.active_for(channel) {
            Some(flow_id) => Action::FlowContinue {
                flow_id,
                input: text.to_string(),
            },
            None => {
                let text = text.trim();
                if text.is_empty() {
                    return Routed::Done(Reply::new(EMPTY_INPUT_REPLY, None));
                }
                match classify(text) {
                    Action::None => Action::Query(text.to_string()),
                    action => action,
                }
            }
        };
        debug!(action = ?action.kind(), "classified");

        match action {
            Action::Local(command) => Routed::Execute(command),
            Action::FlowStart(kind) => {
                let started = flows.start(kind, channel, now);
                if let Some(replaced) = started.replaced {
                    self.ctx.emit(AssistantEvent::FlowAborted {
                        flow_id: replaced,
                        reason: AbortReason::Replaced,
                    });
                }
                self.ctx.emit(AssistantEvent::FlowStarted {
                    flow_id: started.flow_id,
                    kind,
                });
                Routed::Done(Reply::pending(started.prompt, ActionKind::FlowStart))
            }
            Action::FlowContinue { flow_id, input } => {
                self.continue_flow(&mut flows, flow_id, &input, now)
            }
            Action::Query(query) => Routed::Query(query),
            Action::None => Routed::Done(Reply::new(EMPTY_INPUT_REPLY, None)),
        }
    }

    fn continue_flow(
        &self,
        flows: &mut FlowEngine,
        flow_id: FlowId,
        input: &str,
        now: Instant,
    ) -> Routed {
        let outcome = match flows.advance(flow_id, input, now) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "flow input dropped");
                return Routed::Done(Reply::new(AbortReason::Timeout.user_message(), None));
            }
        };
        self.report(&outcome);

        match outcome {
            FlowOutcome::Prompt { text, .. } => {
                Routed::Done(Reply::pending(text, ActionKind::FlowContinue))
            }
            FlowOutcome::Completed {
                flow_id,
                command: CompletedCommand::SendMessage { recipient, body },
            } => Routed::Deliver {
                flow_id,
                recipient,
                body,
            },
            FlowOutcome::Aborted { reason, .. } => Routed::Done(Reply::new(
                reason.user_message(),
                Some(ActionKind::FlowContinue),
            )),
        }
    }

    fn report(&self, outcome: &FlowOutcome) {
        match outcome {
            FlowOutcome::Prompt { .. } => {}
            FlowOutcome::Completed { flow_id, .. } => {
                self.ctx
                    .emit(AssistantEvent::FlowCompleted { flow_id: *flow_id });
            }
            FlowOutcome::Aborted { flow_id, reason } => {
                self.ctx.emit(AssistantEvent::FlowAborted {
                    flow_id: *flow_id,
                    reason: *reason,
                });
            }
        }
    }
}

fn outcome_text(outcome: FlowOutcome) -> String {
    match outcome {
        FlowOutcome::Prompt { text, .. } => text,
        FlowOutcome::Completed { .. } => MESSAGE_SENT_REPLY.to_string(),
        FlowOutcome::Aborted { reason, .. } => reason.user_message().to_string(),
    }
}

/// First `limit` characters of `text`
fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
