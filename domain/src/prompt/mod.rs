//! Prompt templates for the channel round flow

pub mod template;

pub use template::PromptTemplate;
