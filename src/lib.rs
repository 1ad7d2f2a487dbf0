//! DexFlow - Core Library
//! Simulated DEX order execution engine

// Public modules
pub mod core;
pub mod venue;
pub mod router;
pub mod store;
pub mod broadcast;
pub mod pipeline;
pub mod queue;
pub mod service;

// Re-exports
pub use core::{AppConfig, Error, Result};
