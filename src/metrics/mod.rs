//! Metrics for the import engine
//!
//! Counters and histograms go through the `metrics` facade. Nothing is
//! exported unless [`init_metrics`] installs the Prometheus recorder, so the
//! engine can be used as a library without any metrics backend.

pub mod import;

pub use import::ImportMetrics;

use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Install the Prometheus recorder and its HTTP listener. Idempotent; must be
/// called from within a tokio runtime.
pub fn init_metrics(listen_addr: &str) {
    INIT.call_once(|| {
        let addr = match listen_addr.parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(_) => {
                warn!("Invalid metrics listen address '{}', metrics disabled", listen_addr);
                return;
            }
        };

        let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
        match builder.install() {
            Ok(()) => {
                ImportMetrics::register_metrics();
                info!("Prometheus exporter listening at http://{}/metrics", addr);
            }
            Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
        }
    });
}

/// Trait for phase-specific metrics collections
pub trait PhaseMetrics {
    /// Pre-register every metric of the phase
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
}

/// Build a metric name following `sms_{phase}_{name}[_total]`
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("sms_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("sms_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;

#[cfg(test)]
mod tests {
    #[test]
    fn test_metric_naming_convention() {
        assert_eq!(
            phase_metric!(counter, "import", "batches"),
            "sms_import_batches_total"
        );
        assert_eq!(
            phase_metric!(histogram, "import", "batch_duration_seconds"),
            "sms_import_batch_duration_seconds"
        );
    }
}
