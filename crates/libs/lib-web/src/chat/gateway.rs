//! # AI Gateway
//!
//! Client for an OpenAI-compatible chat-completions service.
//!
//! One call to [`AiGateway::complete`] performs exactly one outbound request:
//! the configured system prompt followed by the transcript, posted to
//! `{base_url}/chat/completions`. There is no retry. Callers decide how a
//! failure degrades.
//!
//! ## Configuration
//!
//! | Variable | Default |
//! |----------|---------|
//! | `OPENAI_API_KEY` / `DEEPSEEK_API_KEY` | none (gateway reports `NotConfigured`) |
//! | `AI_MODEL` | provider default |
//! | `AI_BASE_URL` | provider default |
//! | `AI_SYSTEM_PROMPT` | fitness club assistant prompt |
//! | `AI_TIMEOUT_SECS` | 8 |
//! | `AI_CONTEXT_WINDOW` | 20 |
//! | `AI_MAX_TOKENS` | 500 |
//! | `AI_TEMPERATURE` | 0.7 |

use async_trait::async_trait;
use lib_core::Sender;
use lib_utils::{get_env, get_env_or, get_env_parse_or};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use lib_core::dto::TranscriptEntry as TranscriptTurn;

/// Reply used when the service answers successfully but with nothing usable.
pub const EMPTY_REPLY_FALLBACK: &str = "I'm sorry, I had trouble thinking of a response.";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly and professional assistant for a fitness club. \
    Answer questions about memberships, class schedules, personal training and club facilities. \
    Keep answers short and clear. If you don't know something, say so and suggest contacting the front desk.";

// region: --- Errors

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Network failure, connect failure or deadline exceeded.
    #[error("AI service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The service answered with a non-success status.
    #[error("AI service rejected the request with status {status}: {body}")]
    UpstreamRejected { status: u16, body: String },

    /// No API key configured; no request was made.
    #[error("AI service is not configured")]
    NotConfigured,
}

// endregion: --- Errors

// region: --- Provider & Config

/// Supported providers. Both speak the OpenAI chat-completions protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AiProvider {
    #[default]
    OpenAI,
    DeepSeek,
}

impl AiProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            AiProvider::OpenAI => "gpt-4o-mini",
            AiProvider::DeepSeek => "deepseek-chat",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            AiProvider::OpenAI => "https://api.openai.com/v1",
            AiProvider::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            AiProvider::OpenAI => "OPENAI_API_KEY",
            AiProvider::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub provider: AiProvider,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub system_prompt: String,
    /// Whole-request deadline.
    pub timeout: Duration,
    /// Maximum number of persisted messages sent as context for a turn.
    pub context_window: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GatewayConfig {
    /// Defaults for a provider, with an empty API key.
    pub fn for_provider(provider: AiProvider) -> Self {
        Self {
            provider,
            api_key: String::new(),
            model: provider.default_model().to_string(),
            base_url: provider.default_base_url().to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout: Duration::from_secs(8),
            context_window: 20,
            max_tokens: 500,
            temperature: 0.7,
        }
    }

    /// Read gateway settings from the environment.
    ///
    /// The provider is whichever of `OPENAI_API_KEY` / `DEEPSEEK_API_KEY` is set,
    /// OpenAI first.
    pub fn from_env() -> Result<Self, String> {
        let provider = [AiProvider::OpenAI, AiProvider::DeepSeek]
            .into_iter()
            .find(|provider| get_env(provider.api_key_env()).is_ok_and(|key| !key.trim().is_empty()))
            .unwrap_or_default();

        let mut config = Self::for_provider(provider);
        config.api_key = get_env(provider.api_key_env()).unwrap_or_default();
        config.model = get_env_or("AI_MODEL", provider.default_model());
        config.base_url = get_env_or("AI_BASE_URL", provider.default_base_url());
        config.system_prompt = get_env_or("AI_SYSTEM_PROMPT", DEFAULT_SYSTEM_PROMPT);

        let timeout_secs = get_env_parse_or("AI_TIMEOUT_SECS", 8_u64)
            .map_err(|_| "AI_TIMEOUT_SECS must be a whole number of seconds".to_string())?;
        if timeout_secs == 0 {
            return Err("AI_TIMEOUT_SECS must be greater than 0".to_string());
        }
        config.timeout = Duration::from_secs(timeout_secs);

        config.context_window = get_env_parse_or("AI_CONTEXT_WINDOW", 20_usize)
            .map_err(|_| "AI_CONTEXT_WINDOW must be a valid number".to_string())?
            .max(1);
        config.max_tokens = get_env_parse_or("AI_MAX_TOKENS", 500_u32)
            .map_err(|_| "AI_MAX_TOKENS must be a valid number".to_string())?;
        config.temperature = get_env_parse_or("AI_TEMPERATURE", 0.7_f32)
            .map_err(|_| "AI_TEMPERATURE must be a valid number".to_string())?;

        Ok(config)
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

// endregion: --- Provider & Config

// region: --- Trait

/// Produces the assistant's next reply for a transcript.
#[async_trait]
pub trait AiGateway: Send + Sync {
    async fn complete(&self, transcript: &[TranscriptTurn]) -> Result<String, GatewayError>;
}

// endregion: --- Trait

// region: --- OpenAI-compatible client

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn role_for(sender: Sender) -> &'static str {
    match sender {
        Sender::User => "user",
        Sender::Ai => "assistant",
    }
}

/// Pull the first non-blank reply out of a 2xx body.
fn extract_reply(body: &str) -> Option<String> {
    let response: CompletionResponse = serde_json::from_str(body).ok()?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

pub struct OpenAiGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl OpenAiGateway {
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
            .build()?;

        tracing::info!(
            provider = ?config.provider,
            model = %config.model,
            configured = config.is_configured(),
            "[AI] Gateway ready"
        );

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl AiGateway for OpenAiGateway {
    async fn complete(&self, transcript: &[TranscriptTurn]) -> Result<String, GatewayError> {
        if !self.config.is_configured() {
            tracing::warn!("[AI] No API key configured, skipping completion");
            return Err(GatewayError::NotConfigured);
        }

        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(WireMessage {
            role: "system",
            content: &self.config.system_prompt,
        });
        messages.extend(transcript.iter().map(|turn| WireMessage {
            role: role_for(turn.sender),
            content: &turn.text,
        }));

        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        tracing::debug!(model = %self.config.model, turns = transcript.len(), "[AI] Requesting completion");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(timeout = e.is_timeout(), "[AI] Request failed: {}", e);
                GatewayError::UpstreamUnavailable(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "[AI] Upstream rejected request");
            return Err(GatewayError::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }

        match extract_reply(&body) {
            Some(reply) => Ok(reply),
            None => {
                tracing::warn!("[AI] Upstream returned no usable content");
                Ok(EMPTY_REPLY_FALLBACK.to_string())
            }
        }
    }
}

// endregion: --- OpenAI-compatible client
