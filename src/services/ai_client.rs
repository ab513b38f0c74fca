//! Client for a hosted text-generation API (OpenAI-compatible chat completions).
//!
//! Every call is single-turn and bounded by the configured timeout. Failures
//! are reported as [`ProviderUnavailable`] so callers can fall back without
//! matching on transport-library error types.

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Unified "the remote model could not answer" error.
#[derive(Debug, Error)]
pub enum ProviderUnavailable {
    #[error("remote model quota exhausted: {0}")]
    QuotaExceeded(String),

    #[error("remote model unreachable: {0}")]
    Transport(String),

    #[error("remote model rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("remote model returned an unusable response: {0}")]
    Malformed(String),
}

/// Client for the remote language model.
#[derive(Clone)]
pub struct AiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

/// Error envelope returned by OpenAI-compatible APIs.
#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl AiClient {
    /// Create a new remote model client.
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(timeout_seconds.min(5)))
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(base_url = base_url, model = model, "Remote model client initialized");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Submit a single-turn prompt and return the completion text.
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderUnavailable> {
        #[derive(Serialize)]
        struct Message<'a> {
            role: &'static str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            messages: Vec<Message<'a>>,
            max_tokens: u32,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct Response {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMessage,
        }

        #[derive(Deserialize)]
        struct ChoiceMessage {
            #[serde(default)]
            content: Option<String>,
        }

        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, "Remote model request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&Request {
                model: &self.model,
                messages: vec![Message {
                    role: "user",
                    content: prompt,
                }],
                max_tokens,
                temperature: 0.0,
            })
            .send()
            .await
            .map_err(|e| ProviderUnavailable::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        let parsed: Response = response
            .json()
            .await
            .map_err(|e| ProviderUnavailable::Malformed(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ProviderUnavailable::Malformed("empty completion".to_string()))
    }

    /// Check the remote API is reachable with the configured key.
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models", self.base_url);

        self.client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .context("Remote model health check failed")?
            .error_for_status()
            .context("Remote model unhealthy")?;

        Ok(())
    }
}

/// Map a non-success HTTP response onto the unified error kind.
fn classify_error(status: StatusCode, body: &str) -> ProviderUnavailable {
    let envelope = serde_json::from_str::<ApiErrorEnvelope>(body).ok();
    let message = envelope
        .as_ref()
        .map(|e| e.error.message.clone())
        .unwrap_or_else(|| format!("HTTP {}", status));
    let quota_code = envelope
        .as_ref()
        .map(|e| {
            e.error.code.as_deref() == Some("insufficient_quota")
                || e.error.kind.as_deref() == Some("insufficient_quota")
        })
        .unwrap_or(false);

    if status == StatusCode::TOO_MANY_REQUESTS || quota_code {
        warn!(status = %status, "Remote model quota exhausted");
        ProviderUnavailable::QuotaExceeded(message)
    } else if status.is_server_error() {
        ProviderUnavailable::Transport(message)
    } else {
        ProviderUnavailable::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_maps_to_quota() {
        let err = classify_error(StatusCode::TOO_MANY_REQUESTS, "");
        assert!(matches!(err, ProviderUnavailable::QuotaExceeded(_)));
    }

    #[test]
    fn insufficient_quota_code_maps_to_quota_even_without_429() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        match classify_error(StatusCode::FORBIDDEN, body) {
            ProviderUnavailable::QuotaExceeded(msg) => {
                assert_eq!(msg, "You exceeded your current quota")
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn server_errors_are_transport_and_auth_errors_are_rejections() {
        assert!(matches!(
            classify_error(StatusCode::BAD_GATEWAY, "<html>"),
            ProviderUnavailable::Transport(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::UNAUTHORIZED, "{}"),
            ProviderUnavailable::Rejected { status: 401, .. }
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        // Port 9 (discard) is closed on test hosts, so the connect fails fast.
        let client = AiClient::new("http://127.0.0.1:9/v1", "key", "model", 1).unwrap();
        let err = client.complete("hello", 5).await.unwrap_err();
        assert!(matches!(err, ProviderUnavailable::Transport(_)));
    }
}
