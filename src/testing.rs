//! Mock collaborators for tests
//!
//! These let the dispatcher and API run end to end without a microphone,
//! speaker, desktop, or completion provider.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::classifier::LocalCommand;
use crate::config::Config;
use crate::context::{AssistantContext, Collaborators};
use crate::input::{InputSource, ListenError};
use crate::lifecycle::StopFlag;
use crate::model::{ChatCompletion, CompletionRequest, ModelError};
use crate::output::OutputSink;
use crate::system::{ExecutorError, MessagingAutomation, SystemActionExecutor};

// ============================================================================
// Completion
// ============================================================================

/// Completion backend returning queued replies
#[derive(Default)]
pub struct MockCompletion {
    responses: Mutex<VecDeque<Result<String, ModelError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue_reply(&self, reply: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(reply.into()));
    }

    pub fn queue_error(&self, error: ModelError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompletion for MockCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Transport("no mock response queued".into())))
    }
}

// ============================================================================
// System actions
// ============================================================================

/// Executor that records commands and answers with a fixed pattern
#[derive(Default)]
pub struct MockExecutor {
    pub executed: Mutex<Vec<LocalCommand>>,
    unavailable: Mutex<Option<String>>,
}

impl MockExecutor {
    /// Make every following command fail as unavailable
    pub fn set_unavailable(&self, feature: &str) {
        *self.unavailable.lock().unwrap() = Some(feature.to_string());
    }

    pub fn executed(&self) -> Vec<LocalCommand> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SystemActionExecutor for MockExecutor {
    async fn execute(&self, command: &LocalCommand) -> Result<String, ExecutorError> {
        self.executed.lock().unwrap().push(command.clone());
        if let Some(feature) = self.unavailable.lock().unwrap().clone() {
            return Err(ExecutorError::Unavailable(feature));
        }
        Ok(format!("done: {}", command.kind()))
    }
}

/// Messenger that records deliveries
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(String, String)>>,
    fail: Mutex<bool>,
}

impl RecordingMessenger {
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingAutomation for RecordingMessenger {
    async fn send(&self, recipient: &str, body: &str) -> Result<(), ExecutorError> {
        if *self.fail.lock().unwrap() {
            return Err(ExecutorError::Failed("chat client not running".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), body.to_string()));
        Ok(())
    }
}

// ============================================================================
// Input / output
// ============================================================================

/// Input source that plays back a fixed script
///
/// When the script runs out it trips the stop flag and reports a timeout,
/// which ends a dispatch loop after its current iteration.
pub struct ScriptedInput {
    script: VecDeque<Result<String, ListenError>>,
    stop: StopFlag,
    /// Timeouts requested by each listen call, in order
    pub windows: Arc<Mutex<Vec<Duration>>>,
}

impl ScriptedInput {
    pub fn new(
        script: impl IntoIterator<Item = Result<String, ListenError>>,
        stop: StopFlag,
    ) -> Self {
        Self {
            script: script.into_iter().collect(),
            stop,
            windows: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Shorthand for a recognized utterance in a script
pub fn heard(text: &str) -> Result<String, ListenError> {
    Ok(text.to_string())
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn listen(
        &mut self,
        timeout: Duration,
        _phrase_limit: Duration,
    ) -> Result<String, ListenError> {
        self.windows.lock().unwrap().push(timeout);
        match self.script.pop_front() {
            Some(next) => next,
            None => {
                self.stop.stop();
                Err(ListenError::Timeout)
            }
        }
    }
}

/// Output sink that records everything it is given
#[derive(Default)]
pub struct RecordingOutput {
    pub spoken: Mutex<Vec<String>>,
    pub displayed: Mutex<Vec<String>>,
}

impl RecordingOutput {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn displayed(&self) -> Vec<String> {
        self.displayed.lock().unwrap().clone()
    }
}

impl OutputSink for RecordingOutput {
    fn speak(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }

    fn display(&self, text: &str) {
        self.displayed.lock().unwrap().push(text.to_string());
    }
}

// ============================================================================
// Rig
// ============================================================================

/// A context wired to mock collaborators, with handles to inspect them
pub struct TestRig {
    pub ctx: Arc<AssistantContext>,
    pub completion: Arc<MockCompletion>,
    pub executor: Arc<MockExecutor>,
    pub messenger: Arc<RecordingMessenger>,
}

impl TestRig {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        let completion = Arc::new(MockCompletion::new());
        let executor = Arc::new(MockExecutor::default());
        let messenger = Arc::new(RecordingMessenger::default());

        let ctx = Arc::new(AssistantContext::new(
            config,
            Collaborators {
                completion: completion.clone(),
                executor: executor.clone(),
                messenger: messenger.clone(),
            },
        ));

        Self {
            ctx,
            completion,
            executor,
            messenger,
        }
    }
}
