//! LLM Client: the single point of entry for all text-generation calls.
//!
//! ARCHITECTURAL RULE: No other module may call the provider API directly.
//! Every call goes through the `LlmGateway` trait so the engine can be driven
//! by a scripted gateway in tests.
//!
//! The gateway never retries and never parses. Retry policy lives in the
//! session engine; structured extraction lives in `interview::parser`.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Hard ceiling for any single HTTP exchange, independent of per-call budgets.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    /// Network failure, timeout, rate limiting or a 5xx from the provider.
    #[error("LLM upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Missing or rejected credential. Never worth retrying.
    #[error("LLM credential missing or invalid: {0}")]
    UpstreamAuthError(String),

    /// Any other non-2xx answer carrying an error body.
    #[error("LLM request rejected (status {status}): {message}")]
    UpstreamRejected { status: u16, message: String },
}

impl LlmError {
    /// Transient failures may succeed on a later attempt; config failures never do.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::UpstreamUnavailable(_) => true,
            LlmError::UpstreamAuthError(_) => false,
            LlmError::UpstreamRejected { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// Token and wall-clock budget for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallBudget {
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// A single text-completion request.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub budget: CallBudget,
}

/// The text-generation seam. Implement this to swap providers without touching
/// the engine.
///
/// Carried in `AppState` as `Arc<dyn LlmGateway>`.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Returns the raw completion text. An empty string is a valid answer and is
    /// left for the parser to turn into a fallback.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Messages API client used by the service.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(CLIENT_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(&self, request: CompletionRequest<'_>) -> Result<String, LlmError> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::UpstreamAuthError(
                "ANTHROPIC_API_KEY is not set".to_string(),
            ));
        }

        let request_body = AnthropicRequest {
            model: &self.model,
            max_tokens: request.budget.max_tokens,
            system: request.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: request.prompt,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(classify_status(status.as_u16(), message));
        }

        let llm_response: LlmResponse = response
            .json()
            .await
            .map_err(|e| LlmError::UpstreamUnavailable(format!("unreadable response body: {e}")))?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        Ok(llm_response.text().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl LlmGateway for LlmClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, LlmError> {
        let timeout = request.budget.timeout;
        match tokio::time::timeout(timeout, self.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::UpstreamUnavailable(format!(
                "timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }
}

/// Maps a non-2xx provider status to the gateway taxonomy.
fn classify_status(status: u16, message: String) -> LlmError {
    match status {
        401 | 403 => LlmError::UpstreamAuthError(message),
        408 | 429 | 500..=599 => LlmError::UpstreamUnavailable(format!("status {status}: {message}")),
        _ => LlmError::UpstreamRejected { status, message },
    }
}
