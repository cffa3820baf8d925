//! Data model for the discovery pipeline
//!
//! - [`PaperRecord`]: transient parser output, one per feed entry
//! - [`DiscoveryRecord`]: persisted, insert-only record of a discovered paper
//! - [`DateRange`], [`ScanSummary`]: scan request and response shapes

mod discovery;
mod paper;
mod scan;

pub use discovery::{DiscoveriesView, DiscoveryRecord, SourceKind};
pub use paper::{collapse_whitespace, PaperRecord};
pub use scan::{DateRange, ScanSummary};
