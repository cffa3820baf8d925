//! PaperScout discovery pipeline
//!
//! Turns provider queries into persisted discoveries:
//! 1. Query a source per keyword ([`source`])
//! 2. Parse the Atom feed into paper records ([`parser`])
//! 3. Drop duplicates within the batch and against the store ([`dedup`])
//! 4. Merge the survivors into the store ([`scanner`])
//!
//! The secondary provider runs as an external script through [`task`].

pub mod dedup;
pub mod discoveries;
pub mod parser;
pub mod scanner;
pub mod scholar;
pub mod source;
pub mod task;

pub use discoveries::get_discoveries;
pub use scanner::{PrimaryScanRequest, ScanSettings, Scanner};
pub use scholar::ScholarRunner;
pub use source::{create_source, ArxivClient, MockSource, PaperSource, RawPayload};
