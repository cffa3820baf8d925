//! PaperScout Common Library
//!
//! Shared code for the PaperScout services including:
//! - Paper and discovery models
//! - Discovery store abstraction (file, Redis, in-memory)
//! - Error types and handling
//! - Configuration management
//! - Trigger authentication helpers
//! - Metrics and tracing setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use models::{DateRange, DiscoveryRecord, PaperRecord, ScanSummary, SourceKind};
pub use store::DiscoveryStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of new titles echoed back in a scan summary by default
pub const DEFAULT_SAMPLE_SIZE: usize = 5;
