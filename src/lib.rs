//! Import and reconciliation engine for show listings.
//!
//! Raw records (export documents or discovery records) are normalized,
//! matched against the catalog, checked for conflicts and then either
//! previewed or committed through a [`storage::Repository`].

pub mod app;
pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod storage;

pub use app::{ExportUseCase, ImportEngine};
pub use config::Config;
pub use error::{ImportError, Result};
pub use pipeline::executor::OutcomeEvent;
pub use pipeline::processing::matching::{Candidate, MatchResult};
pub use pipeline::{ImportOutcome, ImportReport, ImportResultEntry, ImportSummary, Mode, RawInput};
