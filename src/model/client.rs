//! Model client adapter
//!
//! Turns a user utterance plus recent context into a completion request,
//! enforces the call timeout, and records successful exchanges in memory.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use super::ModelError;
use crate::memory::{ConversationMemory, ConversationTurn, Speaker};

/// Role of a message on the completion wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a completion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Provider-agnostic completion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
}

/// External completion collaborator
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Perform one completion and return the text of the first choice
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError>;
}

/// Builds requests for the completion collaborator and records exchanges
pub struct ModelClient {
    backend: Arc<dyn ChatCompletion>,
    system_prompt: String,
    timeout: Duration,
}

impl ModelClient {
    pub fn new(backend: Arc<dyn ChatCompletion>, system_prompt: String, timeout: Duration) -> Self {
        Self {
            backend,
            system_prompt,
            timeout,
        }
    }

    /// Request a completion for `user_text` with the given context
    ///
    /// One attempt only. A call that outlives the timeout is reported as
    /// [`ModelError::Transport`].
    pub async fn complete(
        &self,
        user_text: &str,
        context: &[ConversationTurn],
    ) -> Result<String, ModelError> {
        let request = self.build_request(user_text, context);
        debug!(messages = request.messages.len(), "sending completion request");

        match tokio::time::timeout(self.timeout, self.backend.complete(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::Transport(format!(
                "no response within {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    /// Ask with the memory's context window and record the exchange on success
    ///
    /// Memory is left untouched when the call fails.
    pub async fn ask(
        &self,
        memory: &ConversationMemory,
        user_text: &str,
    ) -> Result<String, ModelError> {
        let context = memory.context_window();

        match self.complete(user_text, &context).await {
            Ok(reply) => {
                memory.append_exchange(user_text, reply.clone());
                Ok(reply)
            }
            Err(e) => {
                warn!(error = %e, "completion failed");
                Err(e)
            }
        }
    }

    fn build_request(&self, user_text: &str, context: &[ConversationTurn]) -> CompletionRequest {
        let mut messages = Vec::with_capacity(context.len() + 2);
        messages.push(ChatMessage {
            role: Role::System,
            content: self.system_prompt.clone(),
        });
        messages.extend(context.iter().map(|turn| ChatMessage {
            role: match turn.role {
                Speaker::User => Role::User,
                Speaker::Assistant => Role::Assistant,
            },
            content: turn.text.clone(),
        }));
        messages.push(ChatMessage {
            role: Role::User,
            content: user_text.to_string(),
        });

        CompletionRequest { messages }
    }
}

/// System instruction sent ahead of every request
pub fn system_prompt(assistant_name: &str, user_name: &str) -> String {
    format!(
        "You are {assistant_name}, a helpful AI assistant. The user's name is {user_name}. \
         Be professional, concise, and helpful. Keep responses under 2-3 sentences \
         because they may be spoken aloud. Use a professional tone but remain friendly."
    )
}
