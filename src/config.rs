//! Configuration loading and management

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Prefix shared by every environment override
const ENV_PREFIX: &str = "CUTIE_";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Name the assistant uses for itself
    pub assistant_name: String,

    /// Name the assistant addresses the user by
    pub user_name: String,

    /// Token that wakes the voice loop (matched case-insensitively)
    pub wake_word: String,

    /// Address the HTTP chat API binds to
    pub bind_addr: SocketAddr,

    /// Completion provider settings
    pub model: ModelConfig,

    /// Listen windows for the voice loop
    pub listen: ListenConfig,

    /// Maximum characters of a model reply spoken on the voice channel
    pub voice_reply_limit: usize,

    /// Outer deadline for a voice flow stage
    pub voice_flow_timeout: Duration,

    /// Deadline for a text-channel flow stage
    pub text_flow_timeout: Duration,
}

/// Completion provider settings
#[derive(Clone)]
pub struct ModelConfig {
    /// Full URL of the OpenAI-compatible chat completions endpoint
    pub api_url: String,
    /// Bearer token, if the provider needs one
    pub api_key: Option<String>,
    /// Model identifier sent with every request
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on a single completion call
    pub request_timeout: Duration,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// A bounded wait on the input source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenWindow {
    /// How long to wait for speech to start
    pub timeout: Duration,
    /// How long a single phrase may run
    pub phrase_limit: Duration,
}

impl ListenWindow {
    pub const fn from_secs(timeout: u64, phrase_limit: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout),
            phrase_limit: Duration::from_secs(phrase_limit),
        }
    }
}

/// Listen windows and recognition bookkeeping for the voice loop
#[derive(Debug, Clone)]
pub struct ListenConfig {
    /// Waiting for the wake word
    pub idle: ListenWindow,
    /// Waiting for a command after the wake word
    pub command: ListenWindow,
    /// Waiting for the next answer of an active flow
    pub flow: ListenWindow,
    /// Consecutive recognition failures before the counter is reset
    pub recognition_reset_threshold: u32,
    /// Pause after a transport failure from the recognizer
    pub transport_backoff: Duration,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            idle: ListenWindow::from_secs(2, 4),
            command: ListenWindow::from_secs(3, 3),
            flow: ListenWindow::from_secs(5, 5),
            recognition_reset_threshold: 10,
            transport_backoff: Duration::from_secs(1),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            api_key: None,
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assistant_name: "Cutie".to_string(),
            user_name: "friend".to_string(),
            wake_word: "cutie".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            model: ModelConfig::default(),
            listen: ListenConfig::default(),
            voice_reply_limit: 200,
            voice_flow_timeout: Duration::from_secs(30),
            text_flow_timeout: Duration::from_secs(120),
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|value| !value.trim().is_empty())
        };

        if let Some(name) = var("ASSISTANT_NAME") {
            config.assistant_name = name;
        }
        if let Some(name) = var("USER_NAME") {
            config.user_name = name;
        }
        if let Some(word) = var("WAKE_WORD") {
            config.wake_word = word.trim().to_lowercase();
        }
        if let Some(addr) = var("BIND_ADDR") {
            config.bind_addr = parse("CUTIE_BIND_ADDR", &addr)?;
        }
        if let Some(url) = var("API_URL") {
            config.model.api_url = url;
        }
        if let Some(model) = var("MODEL") {
            config.model.model = model;
        }
        if let Some(secs) = var("MODEL_TIMEOUT_SECS") {
            config.model.request_timeout =
                Duration::from_secs(parse("CUTIE_MODEL_TIMEOUT_SECS", &secs)?);
        }
        if let Some(limit) = var("VOICE_REPLY_LIMIT") {
            config.voice_reply_limit = parse("CUTIE_VOICE_REPLY_LIMIT", &limit)?;
        }
        if let Some(secs) = var("TEXT_FLOW_TIMEOUT_SECS") {
            config.text_flow_timeout =
                Duration::from_secs(parse("CUTIE_TEXT_FLOW_TIMEOUT_SECS", &secs)?);
        }

        config.model.api_key = lookup("GROQ_API_KEY").filter(|key| !key.trim().is_empty());

        Ok(config)
    }
}

fn parse<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("invalid value for {name}: {raw:?}"))
}
