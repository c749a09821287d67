//! Consensus channel domain: configuration, transcript, verdict grammar, run state
//!
//! A channel run walks the state machine
//! `INIT -> ROUND_ACTIVE(n) -> {ROUND_ACTIVE(n+1) | CONSENSUS | FAILED_SUMMARY | EXHAUSTED}`.
//! The types in this module carry the state; the round loop itself lives in
//! the application layer where it can reach the agent gateway port.

pub mod config;
pub mod run;
pub mod transcript;
pub mod verdict;
