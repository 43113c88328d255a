//! Record sources.
//!
//! A source yields the full, bounded list of raw records in document order.
//! The pipeline only depends on [`RecordSource`]; the file and HTTP backends
//! share [`extract_records`] to locate the record list inside the document.

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::types::RawRecord;
use serde_json::Value;

pub mod file;
pub mod http;

pub use file::FileSource;
pub use http::HttpSource;

/// Default field holding the record list in a feed document
pub const DEFAULT_RECORDS_FIELD: &str = "urls";

/// Core trait every record source implements
pub trait RecordSource: Send + Sync {
    /// Human readable label (path or URL), stamped on every record
    fn describe(&self) -> String;

    /// Read the whole document and return its records
    fn read(&self) -> Result<Vec<RawRecord>, SourceError>;
}

/// HTTP when a URL is configured, otherwise the local file
pub fn from_config(config: &SourceConfig) -> Result<Box<dyn RecordSource>, SourceError> {
    match &config.url {
        Some(url) => Ok(Box::new(HttpSource::new(
            url.clone(),
            config.records_field.clone(),
            config.timeout(),
        )?)),
        None => Ok(Box::new(FileSource::new(
            config.file.clone(),
            config.records_field.clone(),
        ))),
    }
}

/// Locate the record list in a parsed document.
///
/// Accepted shapes: a top-level array, `{ "<field>": [...] }`, or
/// `{ "data": { "<field>": [...] } }`. When the root list is `null` or empty
/// the `data` variant is tried before concluding the feed had nothing.
pub fn extract_records(document: Value, field: &str) -> Result<Vec<RawRecord>, SourceError> {
    match document {
        Value::Array(records) => Ok(records),
        Value::Object(mut root) => {
            let nested = root.remove("data");
            match root.remove(field) {
                Some(list) => {
                    let records = into_list(list, field)?;
                    if records.is_empty() && nested.is_some() {
                        // Null or empty at the root; the list may still sit under `data`
                        return nested_records(nested, field).or(Ok(records));
                    }
                    Ok(records)
                }
                None => nested_records(nested, field),
            }
        }
        other => Err(SourceError::Shape(format!(
            "expected an array or object at top level, found {}",
            json_type_name(&other)
        ))),
    }
}

fn nested_records(data: Option<Value>, field: &str) -> Result<Vec<RawRecord>, SourceError> {
    match data {
        Some(Value::Object(mut data)) => match data.remove(field) {
            Some(list) => into_list(list, field),
            None => Err(SourceError::Shape(format!(
                "object 'data' has no '{}' field",
                field
            ))),
        },
        Some(Value::Array(records)) => Ok(records),
        _ => Err(SourceError::Shape(format!(
            "expected an array or an object with a '{}' field",
            field
        ))),
    }
}

fn into_list(value: Value, field: &str) -> Result<Vec<RawRecord>, SourceError> {
    match value {
        Value::Array(records) => Ok(records),
        Value::Null => Ok(Vec::new()),
        other => Err(SourceError::Shape(format!(
            "field '{}' must be an array, found {}",
            field,
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
