//! Message-thread writer port
//!
//! When a run is attached to an external conversation, its final answer is
//! written into that thread through this port. The write must be
//! idempotent: if a placeholder record already exists for the correlation
//! id, its content is replaced in place rather than duplicated.

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by thread writer implementations
#[derive(Error, Debug)]
pub enum ThreadWriteError {
    #[error("Thread store unavailable: {0}")]
    Unavailable(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Writes a run's final answer into an external message thread
#[async_trait]
pub trait ThreadWriter: Send + Sync {
    /// Create or replace the final-answer record for `correlation_id`
    async fn write_or_replace_final_answer(
        &self,
        correlation_id: &str,
        content: &str,
    ) -> Result<(), ThreadWriteError>;
}
