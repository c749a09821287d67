//! OpenRouter implementation of the agent gateway
//!
//! Talks to the OpenRouter chat completions API over HTTPS. Any transport
//! or provider error maps to a [`GatewayError`]; the round protocol above
//! decides whether that is fatal (moderator) or an empty contribution
//! (participant). Per-call timeouts live here, on the HTTP client - the
//! engine never enforces its own.

use crate::config::file_config::GatewayConfig;
use crate::openrouter::types::{ApiErrorBody, ChatRequest, ChatResponse, ChatStreamChunk};
use async_trait::async_trait;
use conclave_application::ports::agent_gateway::{AgentGateway, GatewayError, StreamHandle};
use conclave_domain::{Message, Model, StreamEvent};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Agent gateway backed by the OpenRouter API
pub struct OpenRouterGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    site_url: Option<String>,
    site_name: Option<String>,
}

impl OpenRouterGateway {
    /// Create a gateway with default settings and the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::from_config(&GatewayConfig {
            api_key: Some(api_key.into()),
            ..GatewayConfig::default()
        })
        .expect("API key provided")
    }

    /// Create a gateway from configuration
    ///
    /// Fails fast when no API key can be resolved, instead of performing
    /// calls with an invalid configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            GatewayError::InvalidRequest(
                "Missing OpenRouter credentials: set gateway.api_key or OPENROUTER_API_KEY"
                    .to_string(),
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            site_url: config.site_url.clone(),
            site_name: config.site_name.clone(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn post(&self, body: &ChatRequest<'_>) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(body);
        if let Some(site_url) = &self.site_url {
            request = request.header("HTTP-Referer", site_url);
        }
        if let Some(site_name) = &self.site_name {
            request = request.header("X-Title", site_name);
        }
        request
    }

    fn check_messages(messages: &[Message]) -> Result<(), GatewayError> {
        if messages.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "Message sequence must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AgentGateway for OpenRouterGateway {
    async fn send(&self, model: &Model, messages: &[Message]) -> Result<String, GatewayError> {
        Self::check_messages(messages)?;
        debug!("Sending {} messages to {}", messages.len(), model);

        let body = ChatRequest::new(model.as_str(), messages);
        let response = self.post(&body).send().await.map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_from_response(status, &text, model));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::RequestFailed(format!("Malformed response: {e}")))?;
        parsed
            .into_content()
            .ok_or_else(|| GatewayError::RequestFailed("Completion carried no content".to_string()))
    }

    async fn send_streaming(
        &self,
        model: &Model,
        messages: &[Message],
    ) -> Result<StreamHandle, GatewayError> {
        Self::check_messages(messages)?;

        let body = ChatRequest::new(model.as_str(), messages).streaming();
        let response = self.post(&body).send().await.map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_from_response(status, &text, model));
        }

        let (tx, rx) = mpsc::channel(32);
        let mut bytes = response.bytes_stream();

        tokio::spawn(async move {
            let mut buffer = String::new();
            let mut full_text = String::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // SSE frames are newline-delimited `data: {...}` lines
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        let _ = tx.send(StreamEvent::Completed(full_text)).await;
                        return;
                    }
                    match serde_json::from_str::<ChatStreamChunk>(data) {
                        Ok(parsed) => {
                            if let Some(delta) = parsed.into_delta() {
                                full_text.push_str(&delta);
                                if tx.send(StreamEvent::Delta(delta)).await.is_err() {
                                    // Receiver gone; stop reading
                                    return;
                                }
                            }
                        }
                        Err(e) => warn!("Skipping malformed stream chunk: {}", e),
                    }
                }
            }

            // Stream ended without [DONE]
            let _ = tx.send(StreamEvent::Completed(full_text)).await;
        });

        Ok(StreamHandle::new(rx))
    }
}

fn map_transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::ConnectionError(error.to_string())
    }
}

fn error_from_response(
    status: reqwest::StatusCode,
    body: &str,
    model: &Model,
) -> GatewayError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.to_string());

    if status == reqwest::StatusCode::NOT_FOUND {
        GatewayError::ModelNotAvailable(format!("{model}: {detail}"))
    } else {
        GatewayError::RequestFailed(format!("HTTP {}: {}", status.as_u16(), detail))
    }
}
