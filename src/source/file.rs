use super::{extract_records, RecordSource};
use crate::error::SourceError;
use crate::types::RawRecord;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Reads records from a local JSON document (offline mode)
pub struct FileSource {
    path: PathBuf,
    records_field: String,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, records_field: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            records_field: records_field.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn read(&self) -> Result<Vec<RawRecord>, SourceError> {
        if !self.path.exists() {
            return Err(SourceError::Missing(self.path.clone()));
        }
        let content = fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!("Read {} bytes", content.len());

        let document: serde_json::Value = serde_json::from_str(&content)?;
        let records = extract_records(document, &self.records_field)?;
        info!("Loaded {} raw records from file", records.len());
        Ok(records)
    }
}
