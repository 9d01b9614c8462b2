// Core modules
pub mod api;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod regime;
pub mod strategy;

// Re-export commonly used types
pub use config::{ScannerConfig, Secrets};
pub use engine::{EngineConfig, IterationSummary, ScannerEngine};
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
