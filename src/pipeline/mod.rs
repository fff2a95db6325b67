// Import pipeline: input loading, per-record processing stages, and batch execution

pub mod executor;
pub mod ingestion;
pub mod processing;

pub use executor::{ImportOptions, ReconciliationExecutor};
pub use processing::normalize::RawInput;
pub use processing::report::{ImportOutcome, ImportReport, ImportResultEntry, ImportSummary, Mode};
