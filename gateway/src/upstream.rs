//! Client for the OpenAI-compatible upstream provider.
//!
//! Route handlers wrap these calls into work functions; the dispatcher
//! treats them as opaque units of work.

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::UpstreamConfig;

/// Errors from upstream provider calls.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// No caller credential and no gateway key configured.
    #[error("no API key available for this request")]
    MissingKey,
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),
    #[error("provider returned {status}: {message}")]
    Provider { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Prompt for a chat-completion call (analysis and reasoning tasks).
#[derive(Debug, Clone)]
pub struct ChatPrompt {
    pub prompt: String,
    pub system_instruction: Option<String>,
    /// Overrides the configured default model when set.
    pub model: Option<String>,
    /// Ask the provider for a JSON object response.
    pub json_response: bool,
}

/// Prompt for an image generation call (rendering tasks).
#[derive(Debug, Clone)]
pub struct ImagePrompt {
    pub prompt: String,
    pub model: Option<String>,
    pub aspect_ratio: Option<String>,
    pub image_size: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

pub struct UpstreamClient {
    http_client: Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http_client,
            config,
        }
    }

    /// Pick the credential for a request: the caller's own key wins,
    /// otherwise fall back to the gateway-provisioned key.
    fn resolve_key<'a>(&'a self, credential: Option<&'a str>) -> Result<&'a str, UpstreamError> {
        match credential {
            Some(key) if !key.is_empty() => Ok(key),
            _ if !self.config.api_key.is_empty() => Ok(&self.config.api_key),
            _ => Err(UpstreamError::MissingKey),
        }
    }

    /// Send a chat completion request and return the assistant message
    /// content as JSON.
    pub async fn chat(
        &self,
        prompt: &ChatPrompt,
        credential: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        let key = self.resolve_key(credential)?;
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let mut messages = Vec::new();
        if let Some(system) = &prompt.system_instruction {
            messages.push(ChatMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt.prompt.clone(),
        });

        let request = ChatCompletionRequest {
            model: prompt
                .model
                .clone()
                .unwrap_or_else(|| self.config.models.analysis.clone()),
            messages,
            response_format: prompt
                .json_response
                .then(|| serde_json::json!({ "type": "json_object" })),
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(key)
            .json(&request)
            .send()
            .await
            .map_err(|e| UpstreamError::RequestFailed(e.to_string()))?;

        let body = Self::check_status(response).await?;
        let content = body
            .pointer("/choices/0/message/content")
            .cloned()
            .ok_or_else(|| UpstreamError::InvalidResponse("no message content".to_string()))?;
        Ok(content)
    }

    /// Send an image generation request. Returns the provider's data array.
    pub async fn generate_image(
        &self,
        prompt: &ImagePrompt,
        credential: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        let key = self.resolve_key(credential)?;
        let url = format!("{}/images/edits", self.config.base_url.trim_end_matches('/'));

        let mut form = reqwest::multipart::Form::new()
            .text(
                "model",
                prompt
                    .model
                    .clone()
                    .unwrap_or_else(|| self.config.models.image.clone()),
            )
            .text("prompt", prompt.prompt.clone())
            .text("response_format", "url");
        if let Some(aspect_ratio) = &prompt.aspect_ratio {
            form = form.text("aspect_ratio", aspect_ratio.clone());
        }
        if let Some(image_size) = &prompt.image_size {
            form = form.text("image_size", image_size.clone());
        }

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UpstreamError::RequestFailed(e.to_string()))?;

        let body = Self::check_status(response).await?;
        // Providers differ on whether results sit under "data".
        Ok(body.get("data").cloned().unwrap_or(body))
    }

    async fn check_status(response: reqwest::Response) -> Result<Value, UpstreamError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "upstream provider error");
            return Err(UpstreamError::Provider {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_key: &str) -> UpstreamClient {
        UpstreamClient::new(UpstreamConfig {
            api_key: api_key.to_string(),
            ..UpstreamConfig::default()
        })
    }

    #[test]
    fn test_resolve_key_prefers_caller_credential() {
        let client = client("gateway-key");
        assert_eq!(client.resolve_key(Some("caller-key")).unwrap(), "caller-key");
    }

    #[test]
    fn test_resolve_key_falls_back_to_gateway_key() {
        let client = client("gateway-key");
        assert_eq!(client.resolve_key(None).unwrap(), "gateway-key");
        assert_eq!(client.resolve_key(Some("")).unwrap(), "gateway-key");
    }

    #[test]
    fn test_resolve_key_fails_without_any_key() {
        let client = client("");
        assert!(matches!(
            client.resolve_key(None),
            Err(UpstreamError::MissingKey)
        ));
    }
}
