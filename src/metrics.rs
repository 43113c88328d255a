//! Pipeline metrics
//!
//! Counters and histograms go through the `metrics` facade. The binary
//! installs a Prometheus recorder with [`init_metrics`] and renders the
//! snapshot once the run is over.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::path::Path;

pub const RUNS_TOTAL: &str = "etl_runs_total";
pub const RUN_FAILURES_TOTAL: &str = "etl_run_failures_total";
pub const RECORDS_READ_TOTAL: &str = "etl_records_read_total";
pub const RECORDS_REJECTED_TOTAL: &str = "etl_records_rejected_total";
pub const RECORDS_INSERTED_TOTAL: &str = "etl_records_inserted_total";
pub const RECORDS_SKIPPED_TOTAL: &str = "etl_records_skipped_total";
pub const PHASE_DURATION_SECONDS: &str = "etl_phase_duration_seconds";

/// Install the global Prometheus recorder. No HTTP listener: a batch run is
/// too short-lived to be scraped, so the snapshot is rendered at exit.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Write the rendered snapshot in Prometheus text format (textfile collector)
pub fn write_snapshot(handle: &PrometheusHandle, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, handle.render())
}

pub struct EtlMetrics;

impl EtlMetrics {
    pub fn record_run_started() {
        ::metrics::counter!(RUNS_TOTAL).increment(1);
    }

    pub fn record_run_failed(stage: &'static str) {
        ::metrics::counter!(RUN_FAILURES_TOTAL, "stage" => stage).increment(1);
    }

    pub fn record_extract(read: usize, duration_secs: f64) {
        ::metrics::counter!(RECORDS_READ_TOTAL).increment(read as u64);
        ::metrics::histogram!(PHASE_DURATION_SECONDS, "phase" => "extract").record(duration_secs);
    }

    pub fn record_rejection(reason: &'static str) {
        ::metrics::counter!(RECORDS_REJECTED_TOTAL, "reason" => reason).increment(1);
    }

    pub fn record_transform(duration_secs: f64) {
        ::metrics::histogram!(PHASE_DURATION_SECONDS, "phase" => "transform").record(duration_secs);
    }

    pub fn record_load(inserted: usize, skipped: usize, duration_secs: f64) {
        ::metrics::counter!(RECORDS_INSERTED_TOTAL).increment(inserted as u64);
        ::metrics::counter!(RECORDS_SKIPPED_TOTAL).increment(skipped as u64);
        ::metrics::histogram!(PHASE_DURATION_SECONDS, "phase" => "load").record(duration_secs);
    }
}
