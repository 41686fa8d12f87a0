//! OpenAI-compatible chat completions over HTTP

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{ChatCompletion, CompletionRequest, ModelError};
use crate::config::ModelConfig;

/// Completion collaborator speaking the `/chat/completions` wire format
pub struct HttpCompletion {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl std::fmt::Debug for HttpCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCompletion")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl HttpCompletion {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn build_body(&self, request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

#[async_trait]
impl ChatCompletion for HttpCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        let mut http = self.client.post(&self.api_url).json(&self.build_body(request));
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let response = http
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "completion provider rejected request");
            return Err(ModelError::UpstreamStatus(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        let parsed: CompletionResponse =
            serde_json::from_slice(&body).map_err(|e| ModelError::Decode(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ModelError::Decode("response contained no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ConversationMemory;
    use crate::model::client::{ChatMessage, Role};
    use crate::model::ModelClient;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> ModelConfig {
        ModelConfig {
            api_url: format!("{}/openai/v1/chat/completions", server.uri()),
            api_key: Some("gsk_test".to_string()),
            ..ModelConfig::default()
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: "be brief".into(),
                },
                ChatMessage {
                    role: Role::User,
                    content: "hello".into(),
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/openai/v1/chat/completions"))
            .and(header("authorization", "Bearer gsk_test"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.1-8b-instant",
                "max_tokens": 500,
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "Hi there!"}},
                    {"message": {"role": "assistant", "content": "ignored"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpCompletion::new(&config(&server));
        let reply = backend.complete(&request()).await.unwrap();
        assert_eq!(reply, "Hi there!");
    }

    #[tokio::test]
    async fn test_rate_limited_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let backend = HttpCompletion::new(&config(&server));
        let err = backend.complete(&request()).await.unwrap_err();
        assert_eq!(err, ModelError::UpstreamStatus(429));
    }

    #[tokio::test]
    async fn test_rate_limited_leaves_memory_unchanged() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = ModelClient::new(
            Arc::new(HttpCompletion::new(&config(&server))),
            "be brief".into(),
            Duration::from_secs(10),
        );
        let memory = ConversationMemory::new();

        let result = client.ask(&memory, "tell me a joke").await;
        assert_eq!(result, Err(ModelError::UpstreamStatus(429)));
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let backend = HttpCompletion::new(&config(&server));
        let err = backend.complete(&request()).await.unwrap_err();
        assert!(matches!(err, ModelError::Decode(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_empty_choices() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let backend = HttpCompletion::new(&config(&server));
        let err = backend.complete(&request()).await.unwrap_err();
        assert_eq!(
            err,
            ModelError::Decode("response contained no choices".to_string())
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        let config = ModelConfig {
            api_url: "http://127.0.0.1:9/chat/completions".to_string(),
            ..ModelConfig::default()
        };

        let backend = HttpCompletion::new(&config);
        let err = backend.complete(&request()).await.unwrap_err();
        assert!(matches!(err, ModelError::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "choices": [{"message": {"content": "late"}}]
                    }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = ModelClient::new(
            Arc::new(HttpCompletion::new(&config(&server))),
            "be brief".into(),
            Duration::from_millis(200),
        );

        let err = client.complete("hello", &[]).await.unwrap_err();
        assert!(matches!(err, ModelError::Transport(_)), "got {err:?}");
    }
}
