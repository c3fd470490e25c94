//! Tab relay core — error type and configuration shared by the agent and collector.

pub mod config;
pub mod error;
pub mod json;

pub use config::{AgentConfig, CollectorConfig};
pub use error::{Error, Result};
