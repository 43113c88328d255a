//! Raw record -> canonical record.
//!
//! Only a missing `url` (or a record that is not an object) rejects a record.
//! Malformed optional fields are coerced: unknown status becomes `unknown`,
//! unparseable dates become `None`, odd tag shapes become an empty list.

use crate::types::{CanonicalRecord, RawRecord, UrlStatus};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Timestamp formats accepted for `date_added`, tried in order
const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S UTC", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMAT: &str = "%Y-%m-%d";
const TAG_DELIMITER: char = ',';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingUrl,
    NotAnObject,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingUrl => "missing_url",
            RejectReason::NotAnObject => "not_an_object",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single record failed required-field validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("record rejected: {reason}")]
pub struct RecordRejected {
    pub reason: RejectReason,
}

impl RecordRejected {
    fn new(reason: RejectReason) -> Self {
        Self { reason }
    }
}

/// Maps raw records from one source into canonical records
pub struct Transformer {
    source: String,
}

impl Transformer {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Transform using the current time as `ingested_at`
    pub fn transform(&self, raw: &RawRecord) -> Result<CanonicalRecord, RecordRejected> {
        self.transform_at(raw, Utc::now())
    }

    /// Deterministic for a given `observed_at`
    pub fn transform_at(
        &self,
        raw: &RawRecord,
        observed_at: DateTime<Utc>,
    ) -> Result<CanonicalRecord, RecordRejected> {
        let fields = raw
            .as_object()
            .ok_or_else(|| RecordRejected::new(RejectReason::NotAnObject))?;

        let url = fields
            .get("url")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| RecordRejected::new(RejectReason::MissingUrl))?;

        let url_status = fields
            .get("url_status")
            .and_then(Value::as_str)
            .map(UrlStatus::parse)
            .unwrap_or(UrlStatus::Unknown);

        let date_added = fields
            .get("date_added")
            .and_then(Value::as_str)
            .and_then(parse_date_added);

        Ok(CanonicalRecord {
            url: url.to_string(),
            url_id: url_id(fields),
            url_status,
            date_added,
            threat: string_field(fields, "threat"),
            tags: normalize_tags(fields.get("tags")),
            reporter: string_field(fields, "reporter"),
            source: self.source.clone(),
            ingested_at: observed_at,
        })
    }
}

/// Parse a feed timestamp; `None` when no accepted format matches
pub fn parse_date_added(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    for format in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Normalize `tags` into an ordered list of strings
pub fn normalize_tags(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(joined)) => joined
            .split(TAG_DELIMITER)
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(tag) => Some(tag.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

fn url_id(fields: &Map<String, Value>) -> Option<String> {
    match fields.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(id.trim().to_string()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}
