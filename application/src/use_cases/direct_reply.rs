//! Direct reply use case
//!
//! The simpler, non-round-protocol generation path: one named model answers
//! over an external conversation's ordered history. Unlike the round loop,
//! an in-flight direct generation can be cancelled cooperatively through a
//! [`CancellationToken`].

use crate::ports::agent_gateway::{AgentGateway, GatewayError};
use conclave_domain::{Message, Model};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Errors from the direct reply path
#[derive(Error, Debug)]
pub enum DirectReplyError {
    #[error("Generation cancelled")]
    Cancelled,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Input for a direct generation
#[derive(Debug, Clone)]
pub struct DirectReplyInput {
    pub model: Model,
    /// Ordered conversation history, ending with the user's latest message
    pub history: Vec<Message>,
}

impl DirectReplyInput {
    pub fn new(model: Model, history: Vec<Message>) -> Self {
        Self { model, history }
    }
}

/// Use case producing a single assistant reply for a conversation
pub struct DirectReplyUseCase<G: AgentGateway + 'static> {
    gateway: Arc<G>,
}

impl<G: AgentGateway + 'static> DirectReplyUseCase<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Execute without cancellation support
    pub async fn execute(&self, input: DirectReplyInput) -> Result<String, DirectReplyError> {
        self.execute_cancellable(input, CancellationToken::new())
            .await
    }

    /// Execute, aborting with [`DirectReplyError::Cancelled`] as soon as the
    /// token fires. The underlying transport call is dropped, not awaited.
    pub async fn execute_cancellable(
        &self,
        input: DirectReplyInput,
        token: CancellationToken,
    ) -> Result<String, DirectReplyError> {
        debug!("Direct reply via {}", input.model);
        tokio::select! {
            _ = token.cancelled() => Err(DirectReplyError::Cancelled),
            reply = self.gateway.send(&input.model, &input.history) => Ok(reply?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct SlowGateway;

    #[async_trait]
    impl AgentGateway for SlowGateway {
        async fn send(&self, _model: &Model, _messages: &[Message]) -> Result<String, GatewayError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }
    }

    struct InstantGateway;

    #[async_trait]
    impl AgentGateway for InstantGateway {
        async fn send(&self, _model: &Model, messages: &[Message]) -> Result<String, GatewayError> {
            Ok(format!("reply to: {}", messages.last().unwrap().content))
        }
    }

    #[tokio::test]
    async fn test_direct_reply_returns_text() {
        let use_case = DirectReplyUseCase::new(Arc::new(InstantGateway));
        let input = DirectReplyInput::new(Model::Gpt4o, vec![Message::user("hello")]);
        assert_eq!(use_case.execute(input).await.unwrap(), "reply to: hello");
    }

    #[tokio::test]
    async fn test_cancellation_wins_over_slow_generation() {
        let use_case = DirectReplyUseCase::new(Arc::new(SlowGateway));
        let input = DirectReplyInput::new(Model::Gpt4o, vec![Message::user("hello")]);

        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });

        let result = use_case.execute_cancellable(input, token).await;
        assert!(matches!(result, Err(DirectReplyError::Cancelled)));
    }
}
