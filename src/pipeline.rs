use crate::error::{EtlError, Result};
use crate::metrics::EtlMetrics;
use crate::sink::RecordSink;
use crate::source::RecordSource;
use crate::transform::Transformer;
use crate::types::{CanonicalRecord, RawRecord, RunSummary};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Sequences extract -> transform -> load.
///
/// A source failure aborts before anything is loaded. Rejected records are
/// counted and dropped; the rest of the batch carries on.
pub struct Pipeline {
    source: Box<dyn RecordSource>,
    sink: Arc<dyn RecordSink>,
}

/// Canonical records of one batch plus how many were rejected
struct TransformedBatch {
    records: Vec<CanonicalRecord>,
    rejected: usize,
}

impl Pipeline {
    pub fn new(source: Box<dyn RecordSource>, sink: Arc<dyn RecordSink>) -> Self {
        Self { source, sink }
    }

    #[instrument(skip(self), fields(source = %self.source.describe()))]
    pub fn run(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        EtlMetrics::record_run_started();
        info!(%run_id, "Starting ETL run");

        // Step 1: Extract
        println!("[*] Extracting records from {}...", self.source.describe());
        let t_extract = Instant::now();
        let raw_records = self.source.read().map_err(|e| {
            EtlMetrics::record_run_failed("source");
            error!(%run_id, "Extract failed: {}", e);
            EtlError::from(e)
        })?;
        EtlMetrics::record_extract(raw_records.len(), t_extract.elapsed().as_secs_f64());
        info!("Extracted {} raw records", raw_records.len());

        // Step 2: Transform
        println!("[*] Transforming {} records...", raw_records.len());
        let t_transform = Instant::now();
        let batch = self.transform_batch(&raw_records, Utc::now());
        EtlMetrics::record_transform(t_transform.elapsed().as_secs_f64());
        info!(
            "Transformed {} records ({} rejected)",
            batch.records.len(),
            batch.rejected
        );

        // Step 3: Load
        println!("[*] Loading {} records...", batch.records.len());
        let t_load = Instant::now();
        let report = self.sink.load(&batch.records).map_err(|e| {
            EtlMetrics::record_run_failed("sink");
            error!(%run_id, "Load failed: {}", e);
            EtlError::from(e)
        })?;
        EtlMetrics::record_load(
            report.inserted_count,
            report.skipped_count,
            t_load.elapsed().as_secs_f64(),
        );
        info!(
            "Load completed: {} inserted, {} skipped",
            report.inserted_count, report.skipped_count
        );

        Ok(RunSummary {
            run_id,
            read_count: raw_records.len(),
            transformed_count: batch.records.len(),
            rejected_count: batch.rejected,
            inserted_count: report.inserted_count,
            skipped_count: report.skipped_count,
        })
    }

    fn transform_batch(
        &self,
        raw_records: &[RawRecord],
        observed_at: DateTime<Utc>,
    ) -> TransformedBatch {
        let transformer = Transformer::new(self.source.describe());
        let mut records = Vec::with_capacity(raw_records.len());
        let mut rejected = 0;

        for (i, raw) in raw_records.iter().enumerate() {
            match transformer.transform_at(raw, observed_at) {
                Ok(record) => {
                    debug!("Transformed record {}: {}", i, record.url);
                    records.push(record);
                }
                Err(rejection) => {
                    warn!(index = i, reason = %rejection.reason, "Rejected record");
                    EtlMetrics::record_rejection(rejection.reason.as_str());
                    rejected += 1;
                }
            }
        }

        TransformedBatch { records, rejected }
    }
}
