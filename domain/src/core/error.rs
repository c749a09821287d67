//! Domain error types

use thiserror::Error;

/// Domain-level errors
///
/// These cover invalid channel configurations, all rejected synchronously
/// before any agent call is made.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Task must not be empty")]
    EmptyTask,

    #[error("At least one participant agent is required")]
    NoParticipants,

    #[error("Moderator must not be part of the participant list")]
    ModeratorIsParticipant,

    #[error("Participant models must be distinct")]
    DuplicateParticipants,

    #[error("Round limit {0} is outside the allowed range 1..={max}", max = crate::channel::config::ROUND_LIMIT)]
    RoundLimitOutOfRange(u32),
}
