//! Core module - common types, configuration, and error handling

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, PipelineConfig, QueueConfig};
pub use error::{Error, Result};
pub use types::*;
