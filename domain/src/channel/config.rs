//! Channel configuration

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Hard upper bound for the discussion length
pub const ROUND_LIMIT: u32 = 20;

/// Default number of discussion rounds
pub const DEFAULT_MAX_ROUNDS: u32 = 8;

/// Configuration options for a channel (Value Object)
///
/// Immutable once the round loop starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Maximum number of discussion rounds, within `1..=ROUND_LIMIT`
    pub max_rounds: u32,
    /// Optional system prompt override for the moderator
    pub moderator_system_prompt: Option<String>,
    /// Optional system prompt override for each participant
    pub participant_system_prompt: Option<String>,
}

impl ChannelConfig {
    pub fn new(max_rounds: u32) -> Self {
        Self {
            max_rounds,
            ..Self::default()
        }
    }

    pub fn with_moderator_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.moderator_system_prompt = Some(prompt.into());
        self
    }

    pub fn with_participant_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.participant_system_prompt = Some(prompt.into());
        self
    }

    /// Check the round budget against the allowed range
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_rounds == 0 || self.max_rounds > ROUND_LIMIT {
            return Err(DomainError::RoundLimitOutOfRange(self.max_rounds));
        }
        Ok(())
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            moderator_system_prompt: None,
            participant_system_prompt: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_budget() {
        let config = ChannelConfig::default();
        assert_eq!(config.max_rounds, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_round_budget_bounds() {
        assert_eq!(
            ChannelConfig::new(0).validate(),
            Err(DomainError::RoundLimitOutOfRange(0))
        );
        assert_eq!(
            ChannelConfig::new(21).validate(),
            Err(DomainError::RoundLimitOutOfRange(21))
        );
        assert!(ChannelConfig::new(1).validate().is_ok());
        assert!(ChannelConfig::new(20).validate().is_ok());
    }

    #[test]
    fn test_prompt_overrides() {
        let config = ChannelConfig::default()
            .with_moderator_system_prompt("you decide")
            .with_participant_system_prompt("you answer");
        assert_eq!(config.moderator_system_prompt.as_deref(), Some("you decide"));
        assert_eq!(config.participant_system_prompt.as_deref(), Some("you answer"));
    }
}
