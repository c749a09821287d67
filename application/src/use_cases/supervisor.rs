//! Run supervisor
//!
//! Spawns and tracks channel runs. A submission is validated synchronously,
//! assigned a fresh run id, registered as pending, and scheduled on a
//! bounded worker pool so the caller returns immediately. Exactly one
//! worker owns a given run's engine for its whole lifetime; the only
//! cross-task shared state is the status table and the repository handle.
//!
//! On completion the worker writes the terminal status to the in-memory
//! table, persists the full record (timestamp and per-agent transcript
//! included) through the [`RunRepository`] port, and - when the run is
//! attached to an external conversation - writes the final answer through
//! the [`ThreadWriter`] port.

use crate::ports::agent_gateway::AgentGateway;
use crate::ports::run_repository::{RepositoryError, RunRecord, RunRepository};
use crate::ports::thread_writer::ThreadWriter;
use crate::use_cases::run_channel::Channel;
use conclave_domain::channel::config::DEFAULT_MAX_ROUNDS;
use conclave_domain::{ChannelConfig, DomainError, Model, RunId, RunState, RunStatus, Task};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Size of the run-worker pool. The work is I/O-bound waiting on remote
/// model calls, so a small fixed pool suffices.
pub const DEFAULT_WORKERS: usize = 4;

/// Errors rejecting a run at creation time, before anything is scheduled
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A request to start a consensus run
#[derive(Debug, Clone)]
pub struct SubmitRunRequest {
    pub task: String,
    pub moderator: Model,
    pub participants: Vec<Model>,
    pub max_rounds: u32,
    /// Optional id of an external conversation the final answer should be
    /// written into
    pub correlation_id: Option<String>,
    pub moderator_system_prompt: Option<String>,
    pub participant_system_prompt: Option<String>,
}

impl SubmitRunRequest {
    pub fn new(task: impl Into<String>, moderator: Model, participants: Vec<Model>) -> Self {
        Self {
            task: task.into(),
            moderator,
            participants,
            max_rounds: DEFAULT_MAX_ROUNDS,
            correlation_id: None,
            moderator_system_prompt: None,
            participant_system_prompt: None,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// Launches channel runs on a bounded pool and tracks their progress
///
/// Constructed once at process start and passed by handle to all request
/// handlers; lives until process shutdown.
pub struct ChannelSupervisor<G: AgentGateway + 'static> {
    gateway: Arc<G>,
    repository: Arc<dyn RunRepository>,
    thread_writer: Option<Arc<dyn ThreadWriter>>,
    statuses: Arc<Mutex<HashMap<RunId, RunStatus>>>,
    permits: Arc<Semaphore>,
}

impl<G: AgentGateway + 'static> ChannelSupervisor<G> {
    pub fn new(gateway: Arc<G>, repository: Arc<dyn RunRepository>) -> Self {
        Self::with_workers(gateway, repository, DEFAULT_WORKERS)
    }

    pub fn with_workers(
        gateway: Arc<G>,
        repository: Arc<dyn RunRepository>,
        workers: usize,
    ) -> Self {
        Self {
            gateway,
            repository,
            thread_writer: None,
            statuses: Arc::new(Mutex::new(HashMap::new())),
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn with_thread_writer(mut self, writer: Arc<dyn ThreadWriter>) -> Self {
        self.thread_writer = Some(writer);
        self
    }

    /// Validate the request, register a pending run, and schedule the round
    /// loop in the background. Never blocks on the discussion itself.
    pub async fn submit(&self, request: SubmitRunRequest) -> Result<RunId, SubmitError> {
        let task = Task::try_new(request.task.as_str()).ok_or(DomainError::EmptyTask)?;

        let mut config = ChannelConfig::new(request.max_rounds);
        config.moderator_system_prompt = request.moderator_system_prompt.clone();
        config.participant_system_prompt = request.participant_system_prompt.clone();
        config.validate()?;

        let mut channel = Channel::new(
            Arc::clone(&self.gateway),
            task.clone(),
            request.moderator.clone(),
            request.participants.clone(),
            config.clone(),
        )?;

        let id = RunId::new(Uuid::new_v4().to_string());
        info!("Submitting run {} for task: {}", id, task);

        self.table().insert(id.clone(), RunStatus::pending());

        let record = RunRecord::pending(
            id.clone(),
            &task,
            request.moderator,
            request.participants,
            &config,
            request.correlation_id.clone(),
        );
        self.repository.upsert_run(&record).await?;

        let permits = Arc::clone(&self.permits);
        let statuses = Arc::clone(&self.statuses);
        let repository = Arc::clone(&self.repository);
        let thread_writer = self.thread_writer.clone();
        let run_id = id.clone();

        tokio::spawn(async move {
            // The semaphore is never closed, so acquisition only fails if
            // the process is tearing down
            let Ok(_permit) = permits.acquire_owned().await else {
                warn!("Worker pool unavailable for run {}", run_id);
                return;
            };

            update_status(&statuses, &run_id, RunStatus::running());
            debug!("Run {} started", run_id);

            let outcome = channel.run().await;
            let rounds_executed = channel.rounds_executed();
            let transcript = channel.transcript_log();

            match outcome {
                Ok(answer) => {
                    update_status(
                        &statuses,
                        &run_id,
                        RunStatus::finished(rounds_executed, answer.clone()),
                    );
                    let terminal = record.finish(rounds_executed, answer.clone(), transcript);
                    if let Err(e) = repository.upsert_run(&terminal).await {
                        warn!("Failed to persist run {}: {}", run_id, e);
                    }
                    if let (Some(writer), Some(correlation_id)) =
                        (thread_writer, &terminal.correlation_id)
                    {
                        if let Err(e) = writer
                            .write_or_replace_final_answer(correlation_id, &answer)
                            .await
                        {
                            warn!("Failed to write answer for run {}: {}", run_id, e);
                        }
                    }
                    info!("Run {} finished after {} rounds", run_id, rounds_executed);
                }
                Err(e) => {
                    let message = e.to_string();
                    update_status(
                        &statuses,
                        &run_id,
                        RunStatus::failed(rounds_executed, message.clone()),
                    );
                    let terminal = record.fail(rounds_executed, message, transcript);
                    if let Err(e) = repository.upsert_run(&terminal).await {
                        warn!("Failed to persist run {}: {}", run_id, e);
                    }
                    warn!("Run {} ended in error", run_id);
                }
            }
        });

        Ok(id)
    }

    /// Current status of a run; `None` means the id is unknown.
    ///
    /// The in-memory record is authoritative once it has progressed past
    /// Pending (it is updated synchronously by the owning worker). For
    /// anything else - a cold cache after a restart, or a row still pending
    /// locally - fall back to the repository.
    pub async fn status(&self, id: &RunId) -> Result<Option<RunStatus>, RepositoryError> {
        let cached = self.table().get(id).cloned();
        if let Some(status) = &cached
            && status.state != RunState::Pending
        {
            return Ok(cached);
        }

        match self.repository.read_run(id).await? {
            Some(record) => Ok(Some(record.status())),
            None => Ok(cached),
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<RunId, RunStatus>> {
        // Recover from a poisoned lock: a worker panicking mid-update only
        // ever leaves a stale-but-valid snapshot behind
        self.statuses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn update_status(
    statuses: &Arc<Mutex<HashMap<RunId, RunStatus>>>,
    id: &RunId,
    status: RunStatus,
) {
    let mut table = statuses
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    table.insert(id.clone(), status);
}
