//! Run identity and status value objects

use serde::{Deserialize, Serialize};

/// Opaque identifier of one channel run (Value Object)
///
/// Assigned exactly once at submission time and never reused. Used as the
/// correlation key for status lookups and for attaching the final answer to
/// an external message record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution state of a channel run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Pending,
    Running,
    Finished,
    Error,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Running => "running",
            RunState::Finished => "finished",
            RunState::Error => "error",
        }
    }

    /// Finished and Error are terminal; a run becomes terminal exactly once
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Finished | RunState::Error)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time view of a run, as served by the status query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    pub state: RunState,
    pub rounds_executed: u32,
    pub answer: Option<String>,
    pub error: Option<String>,
}

impl RunStatus {
    pub fn pending() -> Self {
        Self {
            state: RunState::Pending,
            rounds_executed: 0,
            answer: None,
            error: None,
        }
    }

    pub fn running() -> Self {
        Self {
            state: RunState::Running,
            ..Self::pending()
        }
    }

    pub fn finished(rounds_executed: u32, answer: impl Into<String>) -> Self {
        Self {
            state: RunState::Finished,
            rounds_executed,
            answer: Some(answer.into()),
            error: None,
        }
    }

    pub fn failed(rounds_executed: u32, error: impl Into<String>) -> Self {
        Self {
            state: RunState::Error,
            rounds_executed,
            answer: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!RunState::Pending.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(RunState::Finished.is_terminal());
        assert!(RunState::Error.is_terminal());
    }

    #[test]
    fn test_state_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&RunState::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&RunState::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn test_run_id_is_transparent() {
        let id = RunId::new("abc-123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc-123\"");
    }

    #[test]
    fn test_status_constructors() {
        let status = RunStatus::finished(3, "42");
        assert_eq!(status.state, RunState::Finished);
        assert_eq!(status.rounds_executed, 3);
        assert_eq!(status.answer.as_deref(), Some("42"));
        assert!(status.error.is_none());

        let status = RunStatus::failed(2, "boom");
        assert_eq!(status.state, RunState::Error);
        assert_eq!(status.error.as_deref(), Some("boom"));
    }
}
