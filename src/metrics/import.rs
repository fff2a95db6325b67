//! Import Phase Metrics
//!
//! Batch throughput, per-outcome record counts, catalog writes and storage
//! failures of the reconciliation engine.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for the Import phase
pub struct ImportMetrics;

impl ImportMetrics {
    /// Record a finished batch
    pub fn record_batch(mode: &'static str, records: usize, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "import", "batches"), "mode" => mode).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "import", "batch_records"), "mode" => mode)
            .record(records as f64);
        ::metrics::histogram!(
            phase_metric!(histogram, "import", "batch_duration_seconds"),
            "mode" => mode
        )
        .record(duration_secs);
    }

    /// Record the classification of one record
    pub fn record_outcome(mode: &'static str, outcome: &'static str) {
        ::metrics::counter!(
            phase_metric!(counter, "import", "records"),
            "mode" => mode,
            "outcome" => outcome
        )
        .increment(1);
    }

    /// Record a catalog entity written during Commit
    pub fn record_entity_created(entity: &'static str) {
        ::metrics::counter!(phase_metric!(counter, "import", "entities_created"), "entity" => entity)
            .increment(1);
    }

    /// Record a repository failure caught for a record
    pub fn record_persistence_failure() {
        ::metrics::counter!(phase_metric!(counter, "import", "persistence_failures")).increment(1);
    }
}

impl PhaseMetrics for ImportMetrics {
    fn register_metrics() {
        use metrics::{counter, histogram};

        let _ = counter!(phase_metric!(counter, "import", "batches"));
        let _ = counter!(phase_metric!(counter, "import", "records"));
        let _ = counter!(phase_metric!(counter, "import", "entities_created"));
        let _ = counter!(phase_metric!(counter, "import", "persistence_failures"));

        let _ = histogram!(phase_metric!(histogram, "import", "batch_records"));
        let _ = histogram!(phase_metric!(histogram, "import", "batch_duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "import"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "import", "batches"),
                metric_type: MetricType::Counter,
                help: "Total number of import batches executed",
                labels: vec!["mode"],
            },
            MetricDoc {
                name: phase_metric!(counter, "import", "records"),
                metric_type: MetricType::Counter,
                help: "Total number of records classified, by outcome",
                labels: vec!["mode", "outcome"],
            },
            MetricDoc {
                name: phase_metric!(counter, "import", "entities_created"),
                metric_type: MetricType::Counter,
                help: "Artists, venues and shows written to the catalog",
                labels: vec!["entity"],
            },
            MetricDoc {
                name: phase_metric!(counter, "import", "persistence_failures"),
                metric_type: MetricType::Counter,
                help: "Repository failures caught and reported as record errors",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "import", "batch_records"),
                metric_type: MetricType::Histogram,
                help: "Number of records per batch",
                labels: vec!["mode"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "import", "batch_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall-clock duration of a batch",
                labels: vec!["mode"],
            },
        ]
    }
}
