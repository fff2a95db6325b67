use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::Config;
use crate::pipeline::executor::{ImportOptions, OutcomeEvent, ReconciliationExecutor};
use crate::pipeline::processing::normalize::RawInput;
use crate::pipeline::processing::report::{ImportReport, Mode};
use crate::storage::Repository;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Use case for previewing and committing batches of raw show records
pub struct ImportEngine {
    executor: ReconciliationExecutor,
    events: broadcast::Sender<OutcomeEvent>,
    options: ImportOptions,
}

impl ImportEngine {
    pub fn new(repo: Arc<dyn Repository>, config: &Config) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            executor: ReconciliationExecutor::new(repo, config).with_events(events.clone()),
            events,
            options: ImportOptions::default(),
        }
    }

    /// Pin the reference date used for past-show checks
    pub fn with_reference_date(mut self, today: NaiveDate) -> Self {
        self.options.today = today;
        self
    }

    /// Receive one event per record of every later Commit batch
    pub fn subscribe(&self) -> broadcast::Receiver<OutcomeEvent> {
        self.events.subscribe()
    }

    /// Classify a batch without touching the catalog
    pub async fn preview(&self, records: &[RawInput]) -> ImportReport {
        info!("Previewing {} records", records.len());
        self.executor.run(records, Mode::Preview, &self.options).await
    }

    /// Classify and write a batch. `privileged` comes from the caller's
    /// authorization layer and is trusted as given.
    pub async fn commit(&self, records: &[RawInput], privileged: bool) -> ImportReport {
        info!("Committing {} records (privileged: {})", records.len(), privileged);
        self.executor
            .run(records, Mode::Commit { privileged }, &self.options)
            .await
    }
}
