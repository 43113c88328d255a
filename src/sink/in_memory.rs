use super::{RecordSink, TOP_THREATS};
use crate::error::SinkError;
use crate::types::{CanonicalRecord, CollectionStats, InsertOutcome};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// In-memory sink for development/testing
#[derive(Clone, Default)]
pub struct InMemorySink {
    documents: Arc<Mutex<HashMap<String, CanonicalRecord>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn documents(&self) -> Result<MutexGuard<'_, HashMap<String, CanonicalRecord>>, SinkError> {
        self.documents.lock().map_err(|_| SinkError::Poisoned)
    }
}

impl RecordSink for InMemorySink {
    fn insert_if_absent(&self, record: &CanonicalRecord) -> Result<InsertOutcome, SinkError> {
        let mut documents = self.documents()?;
        if documents.contains_key(&record.url) {
            debug!("Skipped existing document: {}", record.url);
            return Ok(InsertOutcome::Skipped);
        }
        documents.insert(record.url.clone(), record.clone());
        debug!("Inserted document: {}", record.url);
        Ok(InsertOutcome::Inserted)
    }

    fn find_by_url(&self, url: &str) -> Result<Option<CanonicalRecord>, SinkError> {
        Ok(self.documents()?.get(url).cloned())
    }

    fn count(&self) -> Result<usize, SinkError> {
        Ok(self.documents()?.len())
    }

    fn stats(&self) -> Result<CollectionStats, SinkError> {
        let documents = self.documents()?;
        let mut stats = CollectionStats {
            total: documents.len(),
            ..CollectionStats::default()
        };
        let mut threats: HashMap<&str, usize> = HashMap::new();

        for record in documents.values() {
            *stats.by_status.entry(record.url_status).or_insert(0) += 1;
            if let Some(threat) = &record.threat {
                *threats.entry(threat.as_str()).or_insert(0) += 1;
            }
            if stats.latest_ingested_at < Some(record.ingested_at) {
                stats.latest_ingested_at = Some(record.ingested_at);
            }
        }

        let mut ranked: Vec<(String, usize)> = threats
            .into_iter()
            .map(|(threat, n)| (threat.to_string(), n))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(TOP_THREATS);
        stats.top_threats = ranked;
        Ok(stats)
    }
}
