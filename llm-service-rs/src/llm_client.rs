// llm-service-rs/src/llm_client.rs
//
// HTTP client for OpenAI-compatible chat-completion endpoints.
//
// Transient failures (5xx, 429, network errors) are retried with exponential
// backoff and jitter; client errors fail immediately.
//
// Configuration (.env file):
// - LLM_API_KEY: API key for the provider (calls fail without it)
// - LLM_API_URL: chat-completions endpoint
// - LLM_MODEL: model name
// - LLM_TEMPERATURE / LLM_MAX_TOKENS: sampling parameters
// - LLM_MAX_RETRIES: retry attempts after the first call (default: 3)
// - LLM_INITIAL_RETRY_DELAY_MS / LLM_MAX_RETRY_DELAY_MS: backoff bounds
// - LLM_REQUEST_TIMEOUT_SECS: per-request timeout (default: 60)

use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use config_rs::{get_env_var, get_optional_var, load_dotenv};
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert Python debugging assistant. \
Follow the requested output format exactly and return complete, runnable code when asked for code.";

const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

/// Errors from a completion call, split by whether retrying can help.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LLMError {
    /// 400, 401, 403 or a missing API key.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 429. Retried with growing delays.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// 500, 502, 503, 504.
    #[error("Server error: {0}")]
    ServerError(String),

    /// Connection failures and timeouts.
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unknown error: {0}")]
    UnknownError(String),
}

impl LLMError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LLMError::ServerError(_) | LLMError::NetworkError(_) | LLMError::RateLimitExceeded(_)
        )
    }
}

/// Map a non-success HTTP status and its body onto an `LLMError`.
pub(crate) fn error_for_status(status: StatusCode, body: &str) -> LLMError {
    match status.as_u16() {
        400 => LLMError::InvalidRequest(format!("Bad request: {}", body)),
        401 => LLMError::InvalidRequest(format!("Unauthorized: {}", body)),
        403 => LLMError::InvalidRequest(format!("Forbidden: {}", body)),
        404 => LLMError::ModelNotAvailable(format!("Not found: {}", body)),
        429 => LLMError::RateLimitExceeded(body.to_string()),
        500 | 502 | 503 | 504 => LLMError::ServerError(format!("({}) {}", status, body)),
        _ => LLMError::UnknownError(format!("({}) {}", status, body)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LLMConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub request_timeout: Duration,
    pub system_prompt: String,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            max_tokens: 2048,
            max_retries: 3,
            initial_retry_delay_ms: 1000,
            max_retry_delay_ms: 30000,
            request_timeout: Duration::from_secs(60),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl LLMConfig {
    /// Reads LLM_* variables, falling back to the defaults above.
    pub fn from_env() -> Self {
        load_dotenv();
        let defaults = Self::default();

        Self {
            api_url: get_env_var("LLM_API_URL", defaults.api_url),
            api_key: get_optional_var("LLM_API_KEY"),
            model: get_env_var("LLM_MODEL", defaults.model),
            temperature: get_env_var("LLM_TEMPERATURE", defaults.temperature),
            max_tokens: get_env_var("LLM_MAX_TOKENS", defaults.max_tokens),
            max_retries: get_env_var("LLM_MAX_RETRIES", defaults.max_retries),
            initial_retry_delay_ms: get_env_var(
                "LLM_INITIAL_RETRY_DELAY_MS",
                defaults.initial_retry_delay_ms,
            ),
            max_retry_delay_ms: get_env_var("LLM_MAX_RETRY_DELAY_MS", defaults.max_retry_delay_ms),
            request_timeout: config_rs::get_duration_secs(
                "LLM_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            ),
            system_prompt: defaults.system_prompt,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LLMClient {
    client: Client,
    config: LLMConfig,
}

impl LLMClient {
    /// Fails only if the HTTP client cannot be built, e.g. when no TLS
    /// backend can be initialised.
    pub fn new(config: LLMConfig) -> Result<Self, LLMError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LLMError::UnknownError(format!("failed to build HTTP client: {}", e)))?;

        if config.api_key.is_none() {
            log::warn!("LLM_API_KEY is not set; completion calls will fail");
        }
        log::info!(
            "LLM client initialized (endpoint: {}, model: {})",
            config.api_url,
            config.model
        );

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, LLMError> {
        Self::new(LLMConfig::from_env())
    }

    pub fn config(&self) -> &LLMConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Exponential backoff doubling from the initial delay, capped at the
    /// configured maximum and at two minutes overall.
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.initial_retry_delay_ms))
            .with_max_interval(Duration::from_millis(self.config.max_retry_delay_ms))
            .with_multiplier(2.0)
            .with_max_elapsed_time(Some(Duration::from_secs(120)))
            .with_randomization_factor(0.5)
            .build()
    }

    /// Generate text with retry on transient failures.
    ///
    /// # Arguments
    /// * `prompt` - The user prompt
    /// * `system_prompt` - Overrides the configured system prompt
    pub async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, LLMError> {
        let mut backoff = self.create_backoff();
        let mut attempt = 0;

        let request_body = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.unwrap_or(&self.config.system_prompt).to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
        };

        log::debug!(
            "Preparing LLM request to {} (model: {}, {} prompt chars)",
            self.config.api_url,
            self.config.model,
            prompt.len()
        );

        loop {
            attempt += 1;

            if attempt > 1 {
                log::info!("Retry attempt {} for LLM request", attempt);
            }

            match self.execute_request(&request_body).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    if !err.is_retryable() || attempt > self.config.max_retries {
                        log::error!("LLM request failed after {} attempts: {}", attempt, err);
                        return Err(err);
                    }

                    match backoff.next_backoff() {
                        Some(backoff_duration) => {
                            let jitter = rand::thread_rng().gen_range(0..=200);
                            let jittered_duration = backoff_duration + Duration::from_millis(jitter);
                            log::warn!("Retryable error: {}. Retrying in {:?}", err, jittered_duration);
                            tokio::time::sleep(jittered_duration).await;
                        }
                        None => {
                            log::error!("Exceeded maximum backoff time: {}", err);
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    async fn execute_request(&self, request_body: &ChatCompletionRequest) -> Result<String, LLMError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| LLMError::InvalidRequest("API key is not set".to_string()))?;

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(request_body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LLMError::NetworkError(format!("Request timed out: {}", err))
                } else if err.is_connect() {
                    LLMError::NetworkError(format!("Connection failed: {}", err))
                } else {
                    LLMError::NetworkError(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &text));
        }

        let data: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| LLMError::ParseError(format!("Failed to parse response: {}", err)))?;

        if let Some(usage) = &data.usage {
            log::info!("LLM request completed. Used {} tokens", usage.total_tokens);
        }

        data.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LLMError::ParseError("No choices returned in response".to_string()))
    }
}
