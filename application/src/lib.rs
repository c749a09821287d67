//! Application layer for conclave
//!
//! This crate contains the round protocol engine, the run supervisor, port
//! definitions, and the direct reply use case. It depends only on the
//! domain layer.

pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use ports::{
    agent_gateway::{AgentGateway, GatewayError, StreamHandle},
    run_repository::{RepositoryError, RunRecord, RunRepository},
    thread_writer::{ThreadWriteError, ThreadWriter},
};
pub use use_cases::direct_reply::{DirectReplyError, DirectReplyInput, DirectReplyUseCase};
pub use use_cases::run_channel::{Channel, ChannelRunError};
pub use use_cases::supervisor::{ChannelSupervisor, SubmitError, SubmitRunRequest};
