//! Anthropic Messages API backend.

use crate::backend::{ModelBackend, ModelRequest, ModelResponse};
use crate::error::LlmError;
use async_trait::async_trait;
use relaybot_core::Result;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default base URL of the Anthropic API.
pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// API version sent with every request.
pub const API_VERSION: &str = "2023-06-01";

const PROVIDER: &str = "anthropic";

/// Client for `POST /v1/messages`.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl AnthropicClient {
    /// Creates a client.
    ///
    /// `timeout` bounds each HTTP exchange; the client never retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or the HTTP client cannot
    /// be built.
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::InvalidConfig {
                reason: "API key is empty".to_string(),
            }
            .into());
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            api_base: api_base.into(),
            api_key,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModelBackend for AnthropicClient {
    #[instrument(skip(self, request), fields(model = %request.model, messages = request.messages.len(), tools = request.tools.len()))]
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
        let response = self
            .http
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "model request failed to send");
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::ProviderUnavailable {
                        provider: PROVIDER.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "model API returned error");
            return Err(status_error(status, retry_after, &body).into());
        }

        let parsed: ModelResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::ResponseParseFailed {
                    reason: e.to_string(),
                })?;

        debug!(
            stop_reason = parsed.stop_reason.as_deref().unwrap_or("unknown"),
            blocks = parsed.content.len(),
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "model response received"
        );

        Ok(parsed)
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

/// Maps a non-success HTTP status and body to an [`LlmError`].
fn status_error(status: StatusCode, retry_after_secs: Option<u64>, body: &str) -> LlmError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| format!("{}: {}", b.error.kind, b.error.message))
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited { retry_after_secs },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::InvalidConfig {
            reason: format!("HTTP {status}: {detail}"),
        },
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
            LlmError::ProviderUnavailable {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP {status}: {detail}"),
            }
        }
        s if s.as_u16() == 529 => LlmError::ProviderUnavailable {
            provider: PROVIDER.to_string(),
            reason: format!("HTTP {status}: {detail}"),
        },
        _ => LlmError::RequestFailed {
            reason: format!("HTTP {status}: {detail}"),
        },
    }
}
