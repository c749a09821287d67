//! In-memory run repository
//!
//! Process-local store used when no durable backend is configured (single
//! binary runs, tests). Records do not survive a restart, so the
//! supervisor's repository fallback finds nothing - acceptable for the
//! standalone CLI, not for a deployment.

use async_trait::async_trait;
use conclave_application::ports::run_repository::{RepositoryError, RunRecord, RunRepository};
use conclave_domain::RunId;
use std::collections::HashMap;
use std::sync::Mutex;

/// Mutex-guarded map of run records
#[derive(Default)]
pub struct InMemoryRunRepository {
    runs: Mutex<HashMap<RunId, RunRecord>>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RunId, RunRecord>> {
        self.runs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn upsert_run(&self, record: &RunRecord) -> Result<(), RepositoryError> {
        self.lock().insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn read_run(&self, id: &RunId) -> Result<Option<RunRecord>, RepositoryError> {
        Ok(self.lock().get(id).cloned())
    }
}
