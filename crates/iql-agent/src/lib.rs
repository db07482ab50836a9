//! IQL agent - language model driven IQL generation
//!
//! The [`RetryController`] asks an [`LlmClient`] for IQL, validates the answer
//! with `iql-ast` against the caller's catalog and contexts, and feeds parse
//! and validation errors back to the model until it succeeds, declares the
//! question unsupported, or runs out of retries.

pub mod catalog;
pub mod config;
pub mod controller;
pub mod llm;
pub mod logging;
pub mod prompt;

pub use catalog::{load_contexts, CatalogError, CatalogFile};
pub use config::{AgentConfig, Config, ConfigError};
pub use controller::{
    AgentError, AggregationMode, FilterMode, Generation, Mode, Outcome, RetryController,
};
pub use llm::{LlmClient, LlmError, Message, OpenAiClient, Role};
