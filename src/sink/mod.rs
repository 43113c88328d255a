use crate::error::SinkError;
use crate::types::{CanonicalRecord, CollectionStats, InsertOutcome, LoadReport};
use tracing::debug;

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemorySink;
pub use sqlite::SqliteSink;

/// Number of `threat` values reported in [`CollectionStats::top_threats`]
pub const TOP_THREATS: usize = 5;

/// Destination collection for canonical records, unique by `url`.
///
/// Existing documents are never overwritten: a record whose `url` is already
/// stored is skipped.
pub trait RecordSink: Send + Sync {
    /// Insert the record unless a document with the same `url` exists
    fn insert_if_absent(&self, record: &CanonicalRecord) -> Result<InsertOutcome, SinkError>;

    fn find_by_url(&self, url: &str) -> Result<Option<CanonicalRecord>, SinkError>;

    fn count(&self) -> Result<usize, SinkError>;

    /// Totals by status, the most frequent threats and the newest ingestion
    fn stats(&self) -> Result<CollectionStats, SinkError>;

    /// Load a batch. The first error aborts; earlier inserts are kept.
    fn load(&self, records: &[CanonicalRecord]) -> Result<LoadReport, SinkError> {
        let mut report = LoadReport::default();
        for record in records {
            let outcome = self.insert_if_absent(record)?;
            debug!(url = %record.url, ?outcome, "Loaded record");
            report.record(outcome);
        }
        Ok(report)
    }
}
