//! Infrastructure layer for conclave
//!
//! Adapters implementing the application-layer ports: the OpenRouter agent
//! gateway, configuration loading, and the in-memory and REST-backed run
//! stores.

pub mod config;
pub mod openrouter;
pub mod persistence;

// Re-export commonly used types
pub use config::{ConfigLoader, FileConfig};
pub use openrouter::OpenRouterGateway;
pub use persistence::{
    memory::InMemoryRunRepository,
    rest::{RestRunRepository, RestThreadWriter},
};
