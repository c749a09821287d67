//! Agent gateway port
//!
//! Defines the interface for sending role-tagged message sequences to a
//! named model. The round protocol treats a participant failure as an empty
//! reply (fail-soft); only a failure on the moderator call is fatal to a
//! run, and that decision belongs to the caller, not the gateway.

use async_trait::async_trait;
use conclave_domain::{Message, Model, StreamEvent};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout")]
    Timeout,

    #[error("Other error: {0}")]
    Other(String),
}

/// Gateway for agent communication
///
/// `messages` is the ordered role-tagged sequence built by the caller;
/// it must be non-empty and use only the system/user/assistant roles.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    /// Send a message sequence to the named model and return its full reply
    async fn send(&self, model: &Model, messages: &[Message]) -> Result<String, GatewayError>;

    /// Send a message sequence and receive the reply incrementally.
    ///
    /// The returned stream is finite and not restartable. Default
    /// implementation calls `send()` and wraps the result in a single
    /// `Completed` event, so non-streaming gateways work without changes.
    async fn send_streaming(
        &self,
        model: &Model,
        messages: &[Message],
    ) -> Result<StreamHandle, GatewayError> {
        let result = self.send(model, messages).await?;
        let (tx, rx) = mpsc::channel(1);
        // If the receiver is dropped before this lands, that's fine
        let _ = tx.send(StreamEvent::Completed(result)).await;
        Ok(StreamHandle::new(rx))
    }
}

/// Handle for receiving streaming events from an agent reply.
///
/// Wraps an `mpsc::Receiver<StreamEvent>` and provides convenience methods
/// for consuming the stream.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// Consume the stream and collect all text into a single string.
    ///
    /// Useful when streaming happens at the transport level but only the
    /// final text is needed.
    pub async fn collect_text(mut self) -> Result<String, GatewayError> {
        let mut full_text = String::new();
        while let Some(event) = self.receiver.recv().await {
            match event {
                StreamEvent::Delta(chunk) => full_text.push_str(&chunk),
                StreamEvent::Completed(text) => {
                    if full_text.is_empty() {
                        return Ok(text);
                    }
                    return Ok(full_text);
                }
                StreamEvent::Error(e) => {
                    return Err(GatewayError::RequestFailed(e));
                }
            }
        }
        // Channel closed without Completed - return what we have
        Ok(full_text)
    }
}
