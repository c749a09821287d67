//! Run repository port
//!
//! Durable store for channel run metadata and outcome. The supervisor
//! writes a pending record at submission and the terminal record once, at
//! completion; reads happen only when the in-memory status cache cannot
//! answer (e.g., after a process restart). Writes are assumed idempotent;
//! at-least-once delivery is acceptable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conclave_domain::{ChannelConfig, Message, Model, RunId, RunState, RunStatus, Task};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors surfaced by run repository implementations
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Persisted form of one channel run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub task: String,
    pub moderator: Model,
    pub participants: Vec<Model>,
    pub max_rounds: u32,
    pub state: RunState,
    pub rounds_executed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Full per-agent message history, keyed by model id; audit only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<BTreeMap<String, Vec<Message>>>,
}

impl RunRecord {
    /// The record registered at submission time
    pub fn pending(
        id: RunId,
        task: &Task,
        moderator: Model,
        participants: Vec<Model>,
        config: &ChannelConfig,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            id,
            task: task.content().to_string(),
            moderator,
            participants,
            max_rounds: config.max_rounds,
            state: RunState::Pending,
            rounds_executed: 0,
            answer: None,
            error: None,
            correlation_id,
            finished_at: None,
            transcript: None,
        }
    }

    /// Terminal transition for a run that produced an answer
    pub fn finish(
        mut self,
        rounds_executed: u32,
        answer: String,
        transcript: BTreeMap<String, Vec<Message>>,
    ) -> Self {
        self.state = RunState::Finished;
        self.rounds_executed = rounds_executed;
        self.answer = Some(answer);
        self.finished_at = Some(Utc::now());
        self.transcript = Some(transcript);
        self
    }

    /// Terminal transition for a run that failed
    pub fn fail(
        mut self,
        rounds_executed: u32,
        error: String,
        transcript: BTreeMap<String, Vec<Message>>,
    ) -> Self {
        self.state = RunState::Error;
        self.rounds_executed = rounds_executed;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
        self.transcript = Some(transcript);
        self
    }

    /// The status view of this record, as served to status queries
    pub fn status(&self) -> RunStatus {
        RunStatus {
            state: self.state,
            rounds_executed: self.rounds_executed,
            answer: self.answer.clone(),
            error: self.error.clone(),
        }
    }
}

/// Durable store for channel run records
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Insert or replace the record for `record.id`
    async fn upsert_run(&self, record: &RunRecord) -> Result<(), RepositoryError>;

    /// Read the record for `id`, or `None` if the id is unknown
    async fn read_run(&self, id: &RunId) -> Result<Option<RunRecord>, RepositoryError>;
}
