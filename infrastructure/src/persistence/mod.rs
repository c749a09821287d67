//! Run store adapters

pub mod memory;
pub mod rest;

pub use memory::InMemoryRunRepository;
pub use rest::{RestRunRepository, RestThreadWriter};
