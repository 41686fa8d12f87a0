//! Shared assistant context
//!
//! Everything the voice loop and the chat API both touch lives here and is
//! handed around as `Arc<AssistantContext>`. Created once at start-up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::debug;

use crate::config::Config;
use crate::events::AssistantEvent;
use crate::flow::{FlowEngine, FlowLimits};
use crate::memory::ConversationMemory;
use crate::model::{system_prompt, ChatCompletion, ModelClient};
use crate::system::{MessagingAutomation, SystemActionExecutor};

/// External systems the context talks to
pub struct Collaborators {
    pub completion: Arc<dyn ChatCompletion>,
    pub executor: Arc<dyn SystemActionExecutor>,
    pub messenger: Arc<dyn MessagingAutomation>,
}

/// Conversation memory, flow state, and collaborator handles
pub struct AssistantContext {
    pub memory: ConversationMemory,
    pub model: ModelClient,
    pub executor: Arc<dyn SystemActionExecutor>,
    pub messenger: Arc<dyn MessagingAutomation>,
    /// Maximum characters of a model reply on the voice channel
    pub voice_reply_limit: usize,
    flows: Mutex<FlowEngine>,
    listening: AtomicBool,
    events: broadcast::Sender<AssistantEvent>,
}

impl AssistantContext {
    pub fn new(config: &Config, collaborators: Collaborators) -> Self {
        let (events, _) = broadcast::channel(64);
        let limits = FlowLimits {
            voice_stage_timeout: config.voice_flow_timeout,
            text_stage_timeout: config.text_flow_timeout,
            ..FlowLimits::default()
        };

        Self {
            memory: ConversationMemory::new(),
            model: ModelClient::new(
                collaborators.completion,
                system_prompt(&config.assistant_name, &config.user_name),
                config.model.request_timeout,
            ),
            executor: collaborators.executor,
            messenger: collaborators.messenger,
            voice_reply_limit: config.voice_reply_limit,
            flows: Mutex::new(FlowEngine::new(limits)),
            listening: AtomicBool::new(false),
            events,
        }
    }

    /// Lock the flow engine
    ///
    /// The guard must not be held across an `.await`.
    pub fn flows(&self) -> MutexGuard<'_, FlowEngine> {
        self.flows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    pub fn set_listening(&self, listening: bool) {
        if self.listening.swap(listening, Ordering::SeqCst) != listening {
            self.emit(AssistantEvent::ListeningChanged { listening });
        }
    }

    /// Subscribe to assistant events
    pub fn subscribe(&self) -> broadcast::Receiver<AssistantEvent> {
        self.events.subscribe()
    }

    /// Broadcast an event; dropped silently when nobody listens
    pub fn emit(&self, event: AssistantEvent) {
        debug!(%event, "emitting event");
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRig;

    #[test]
    fn test_listening_change_emits_once() {
        let rig = TestRig::new();
        let mut events = rig.ctx.subscribe();

        rig.ctx.set_listening(true);
        rig.ctx.set_listening(true);
        rig.ctx.set_listening(false);

        assert_eq!(
            events.try_recv().unwrap(),
            AssistantEvent::ListeningChanged { listening: true }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            AssistantEvent::ListeningChanged { listening: false }
        );
        assert!(events.try_recv().is_err());
    }
}
