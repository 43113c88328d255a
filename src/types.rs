use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Raw record as delivered by a source; nothing about its shape is guaranteed
pub type RawRecord = serde_json::Value;

/// Reported state of a malicious URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlStatus {
    Online,
    Offline,
    Unknown,
}

impl UrlStatus {
    /// Lenient parse: anything unrecognized is `Unknown`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "online" => UrlStatus::Online,
            "offline" => UrlStatus::Offline,
            _ => UrlStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UrlStatus::Online => "online",
            UrlStatus::Offline => "offline",
            UrlStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated, normalized record ready for persistence. `url` is the dedup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub url: String,
    pub url_id: Option<String>,
    pub url_status: UrlStatus,
    pub date_added: Option<DateTime<Utc>>,
    pub threat: Option<String>,
    pub tags: Vec<String>,
    pub reporter: Option<String>,
    pub source: String,
    pub ingested_at: DateTime<Utc>,
}

/// Outcome of a single insert-if-absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub inserted_count: usize,
    pub skipped_count: usize,
}

impl LoadReport {
    pub fn record(&mut self, outcome: InsertOutcome) {
        match outcome {
            InsertOutcome::Inserted => self.inserted_count += 1,
            InsertOutcome::Skipped => self.skipped_count += 1,
        }
    }
}

/// Aggregate view of a destination collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub total: usize,
    pub by_status: BTreeMap<UrlStatus, usize>,
    /// Most frequent `threat` values, most common first, ties by name
    pub top_threats: Vec<(String, usize)>,
    pub latest_ingested_at: Option<DateTime<Utc>>,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub read_count: usize,
    pub transformed_count: usize,
    pub rejected_count: usize,
    pub inserted_count: usize,
    pub skipped_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_status_parse_is_lenient() {
        assert_eq!(UrlStatus::parse("online"), UrlStatus::Online);
        assert_eq!(UrlStatus::parse(" OFFLINE "), UrlStatus::Offline);
        assert_eq!(UrlStatus::parse("dormant"), UrlStatus::Unknown);
        assert_eq!(UrlStatus::parse(""), UrlStatus::Unknown);
    }

    #[test]
    fn test_url_status_serializes_lowercase() {
        let json = serde_json::to_string(&UrlStatus::Online).unwrap();
        assert_eq!(json, "\"online\"");
    }

    #[test]
    fn test_load_report_counts_outcomes() {
        let mut report = LoadReport::default();
        report.record(InsertOutcome::Inserted);
        report.record(InsertOutcome::Skipped);
        report.record(InsertOutcome::Skipped);
        assert_eq!(report.inserted_count, 1);
        assert_eq!(report.skipped_count, 2);
    }
}
