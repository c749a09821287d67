//! REST-backed run store
//!
//! Talks to a PostgREST-compatible object store (e.g. Supabase). Writes go
//! through upserts keyed on the run id, so at-least-once delivery from the
//! supervisor is safe. The thread writer updates the assistant placeholder
//! linked to a correlation id in place; only if no placeholder exists does
//! it insert a fresh row.

use crate::config::file_config::PersistenceConfig;
use async_trait::async_trait;
use conclave_application::ports::run_repository::{RepositoryError, RunRecord, RunRepository};
use conclave_application::ports::thread_writer::{ThreadWriteError, ThreadWriter};
use conclave_domain::RunId;
use serde_json::json;
use tracing::debug;

const DEFAULT_RUNS_TABLE: &str = "consensus_runs";
const DEFAULT_MESSAGES_TABLE: &str = "messages";

/// Run repository backed by a PostgREST endpoint
pub struct RestRunRepository {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl RestRunRepository {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: normalize(base_url.into()),
            api_key: api_key.into(),
            table: DEFAULT_RUNS_TABLE.to_string(),
        }
    }

    /// Build from configuration; `None` when no store URL is configured
    pub fn from_config(config: &PersistenceConfig) -> Option<Self> {
        let (Some(url), Some(key)) = (&config.url, &config.api_key) else {
            return None;
        };
        let mut repository = Self::new(url.clone(), key.clone());
        if let Some(table) = &config.runs_table {
            repository.table = table.clone();
        }
        Some(repository)
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

#[async_trait]
impl RunRepository for RestRunRepository {
    async fn upsert_run(&self, record: &RunRecord) -> Result<(), RepositoryError> {
        debug!("Upserting run {} to {}", record.id, self.table);
        let response = self
            .authorized(self.client.post(self.table_url()))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(&[record])
            .send()
            .await
            .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RepositoryError::Other(format!(
                "Upsert rejected with HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }
        Ok(())
    }

    async fn read_run(&self, id: &RunId) -> Result<Option<RunRecord>, RepositoryError> {
        let response = self
            .authorized(self.client.get(self.table_url()))
            .query(&[("id", format!("eq.{id}")), ("limit", "1".to_string())])
            .send()
            .await
            .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RepositoryError::Other(format!(
                "Read rejected with HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let mut rows: Vec<RunRecord> = response
            .json()
            .await
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.remove(0)))
        }
    }
}

/// Thread writer backed by the same PostgREST endpoint
pub struct RestThreadWriter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl RestThreadWriter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: normalize(base_url.into()),
            api_key: api_key.into(),
            table: DEFAULT_MESSAGES_TABLE.to_string(),
        }
    }

    /// Build from configuration; `None` when no store URL is configured
    pub fn from_config(config: &PersistenceConfig) -> Option<Self> {
        let (Some(url), Some(key)) = (&config.url, &config.api_key) else {
            return None;
        };
        let mut writer = Self::new(url.clone(), key.clone());
        if let Some(table) = &config.messages_table {
            writer.table = table.clone();
        }
        Some(writer)
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

#[async_trait]
impl ThreadWriter for RestThreadWriter {
    async fn write_or_replace_final_answer(
        &self,
        correlation_id: &str,
        content: &str,
    ) -> Result<(), ThreadWriteError> {
        // Update the placeholder in place; at most one row is linked to a
        // given correlation id
        let response = self
            .authorized(self.client.patch(self.table_url()))
            .query(&[("channel_id", format!("eq.{correlation_id}"))])
            .header("Prefer", "return=representation")
            .json(&json!({ "content": content }))
            .send()
            .await
            .map_err(|e| ThreadWriteError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ThreadWriteError::Other(format!(
                "Update rejected with HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let updated: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| ThreadWriteError::Other(e.to_string()))?;
        if !updated.is_empty() {
            return Ok(());
        }

        // No placeholder found: insert a fresh assistant message
        debug!("No placeholder for {}, inserting answer row", correlation_id);
        let response = self
            .authorized(self.client.post(self.table_url()))
            .json(&json!({
                "channel_id": correlation_id,
                "role": "assistant",
                "model": "consensus",
                "generation_mode": "consensus",
                "content": content,
            }))
            .send()
            .await
            .map_err(|e| ThreadWriteError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ThreadWriteError::Other(format!(
                "Insert rejected with HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }
        Ok(())
    }
}

fn normalize(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
