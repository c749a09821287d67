//! Conversation primitives shared by all agents

pub mod entities;
pub mod stream;
