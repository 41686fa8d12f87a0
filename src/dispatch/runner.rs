//! The voice dispatch loop
//!
//! Idle waits for the wake word, Awake takes one command, and
//! AwaitingFlowInput feeds answers into a voice-owned flow until it
//! completes or aborts.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::handler::CommandHandler;
use super::machine::{contains_wake_word, DispatchState, Phase};
use crate::config::{ListenConfig, ListenWindow};
use crate::context::AssistantContext;
use crate::events::AssistantEvent;
use crate::flow::{AbortReason, Channel};
use crate::input::{InputSource, ListenError};
use crate::lifecycle::StopFlag;
use crate::output::OutputSink;

const WAKE_REPLY: &str = "Yes, listening";
const NO_COMMAND_REPLY: &str = "I didn't hear a command";
const UNRECOGNIZED_COMMAND_REPLY: &str = "Could not understand the command";
const RECOGNITION_RESET_NOTICE: &str = "Speech recognition reset, say the wake word again";

/// Drives the input source through the phase machine
pub struct DispatchLoop {
    ctx: Arc<AssistantContext>,
    handler: CommandHandler,
    input: Box<dyn InputSource>,
    output: Arc<dyn OutputSink>,
    state: DispatchState,
    wake_word: String,
    listen: ListenConfig,
    stop: StopFlag,
}

impl DispatchLoop {
    pub fn new(
        ctx: Arc<AssistantContext>,
        input: Box<dyn InputSource>,
        output: Arc<dyn OutputSink>,
        wake_word: impl Into<String>,
        listen: ListenConfig,
        stop: StopFlag,
    ) -> Self {
        Self {
            handler: CommandHandler::new(ctx.clone()),
            ctx,
            input,
            output,
            state: DispatchState::new(),
            wake_word: wake_word.into(),
            listen,
            stop,
        }
    }

    /// Run until the stop flag is set
    ///
    /// The flag is checked once per iteration, so an in-flight listen,
    /// flow step, or model call always finishes first.
    pub async fn run(&mut self) {
        info!(wake_word = %self.wake_word, "dispatch loop started");
        self.ctx.set_listening(true);

        while !self.stop.is_stopped() {
            self.step().await;
        }

        if let Some(message) = self.handler.abort_flow(Channel::Voice, AbortReason::Shutdown) {
            self.output.speak(&message);
        }
        self.enter(Phase::Idle);
        self.ctx.set_listening(false);
        info!("dispatch loop stopped");
    }

    /// One listen and its handling
    pub async fn step(&mut self) {
        match self.state.phase() {
            Phase::Idle => self.idle_step().await,
            Phase::Awake => self.awake_step().await,
            Phase::AwaitingFlowInput => self.flow_step().await,
        }
    }

    async fn idle_step(&mut self) {
        match self.wait_for_speech(self.listen.idle).await {
            Ok(text) => {
                self.state.clear_recognition_failures();
                if contains_wake_word(&text, &self.wake_word) {
                    self.output.speak(WAKE_REPLY);
                    self.enter(Phase::Awake);
                } else {
                    debug!(text = %text, "ignoring speech without wake word");
                }
            }
            Err(ListenError::Timeout) => self.state.clear_recognition_failures(),
            Err(_) => {
                if let Some(failures) = self
                    .state
                    .record_recognition_failure(self.listen.recognition_reset_threshold)
                {
                    self.ctx.emit(AssistantEvent::RecognitionReset { failures });
                    self.output.display(RECOGNITION_RESET_NOTICE);
                } else {
                    debug!(failures = self.state.recognition_failures(), "speech not recognized");
                }
            }
        }
    }

    async fn awake_step(&mut self) {
        match self.wait_for_speech(self.listen.command).await {
            Ok(text) => {
                let reply = self.handler.handle(Channel::Voice, &text).await;
                self.output.speak(&reply.text);
                self.after_reply(reply.flow_pending);
            }
            Err(ListenError::Timeout) => {
                self.output.speak(NO_COMMAND_REPLY);
                self.enter(Phase::Idle);
            }
            Err(_) => {
                self.output.speak(UNRECOGNIZED_COMMAND_REPLY);
                self.enter(Phase::Idle);
            }
        }
    }

    async fn flow_step(&mut self) {
        // The chat API may have replaced or expired the flow while we waited.
        if !self.handler.has_flow(Channel::Voice) {
            if let Some(message) = self.handler.take_notice(Channel::Voice) {
                self.output.speak(&message);
            }
            self.enter(Phase::Idle);
            return;
        }

        match self.wait_for_speech(self.listen.flow).await {
            Ok(text) => {
                let reply = self.handler.handle(Channel::Voice, &text).await;
                self.output.speak(&reply.text);
                self.after_reply(reply.flow_pending);
            }
            Err(ListenError::Timeout) => {
                if let Some(message) = self.handler.flow_timed_out(Channel::Voice) {
                    self.output.speak(&message);
                }
                self.enter(Phase::Idle);
            }
            Err(_) => match self.handler.flow_recognition_failed(Channel::Voice) {
                Some(reply) => {
                    self.output.speak(&reply.text);
                    self.after_reply(reply.flow_pending);
                }
                None => self.enter(Phase::Idle),
            },
        }
    }

    async fn wait_for_speech(&mut self, window: ListenWindow) -> Result<String, ListenError> {
        let result = self.input.listen(window.timeout, window.phrase_limit).await;

        if let Err(ListenError::Transport(reason)) = &result {
            warn!(%reason, phase = %self.state.phase(), "recognizer unavailable");
            tokio::time::sleep(self.listen.transport_backoff).await;
        }

        result
    }

    fn after_reply(&mut self, flow_pending: bool) {
        if flow_pending && self.handler.has_flow(Channel::Voice) {
            self.enter(Phase::AwaitingFlowInput);
        } else {
            self.enter(Phase::Idle);
        }
    }

    fn enter(&mut self, phase: Phase) {
        if let Some(transition) = self.state.transition_to(phase) {
            self.ctx.emit(AssistantEvent::PhaseChanged {
                from: transition.from,
                to: transition.to,
            });
        }
    }
}
