//! Use cases orchestrating the consensus channel flow

pub mod direct_reply;
pub mod run_channel;
pub mod supervisor;
