use super::{RecordSink, TOP_THREATS};
use crate::config::StoreConfig;
use crate::error::SinkError;
use crate::types::{CanonicalRecord, CollectionStats, InsertOutcome, UrlStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

pub const IN_MEMORY_URI: &str = ":memory:";

const NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Document collection backed by SQLite.
///
/// One database file per database name under the endpoint directory, one
/// table per collection. Each row keeps the JSON document next to its
/// `url`, which carries a UNIQUE index so insert-if-absent is a single
/// `INSERT OR IGNORE`.
pub struct SqliteSink {
    conn: Mutex<Connection>,
    collection: String,
}

impl SqliteSink {
    pub fn open(config: &StoreConfig) -> Result<Self, SinkError> {
        validate_name("database", &config.database)?;
        validate_name("collection", &config.collection)?;

        let conn = if config.uri == IN_MEMORY_URI {
            Connection::open_in_memory()
                .map_err(|e| SinkError::Unreachable(format!("in-memory store: {e}")))?
        } else if config.uri.contains("://") {
            return Err(SinkError::Unreachable(format!(
                "endpoint '{}' is a network URI; expected a local directory",
                config.uri
            )));
        } else {
            let path = database_path(config);
            fs::create_dir_all(&config.uri).map_err(|e| {
                SinkError::Unreachable(format!("store directory '{}': {e}", config.uri))
            })?;
            Connection::open(&path)
                .map_err(|e| SinkError::Unreachable(format!("{}: {e}", path.display())))?
        };

        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| SinkError::Unreachable(format!("ping failed: {e}")))?;

        let table = &config.collection;
        conn.execute_batch(&format!(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS "{table}" (
                doc_id       TEXT PRIMARY KEY,
                url          TEXT NOT NULL,
                ingested_at  TEXT NOT NULL,
                document     TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS "{table}_url_unique" ON "{table}" (url);
            CREATE INDEX IF NOT EXISTS "{table}_ingested_at" ON "{table}" (ingested_at);
            "#
        ))?;

        info!(
            "Connected to document store: {}.{}",
            config.database, config.collection
        );
        Ok(Self {
            conn: Mutex::new(conn),
            collection: config.collection.clone(),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, SinkError> {
        self.conn.lock().map_err(|_| SinkError::Poisoned)
    }
}

impl RecordSink for SqliteSink {
    fn insert_if_absent(&self, record: &CanonicalRecord) -> Result<InsertOutcome, SinkError> {
        let document = serde_json::to_string(record)?;
        let conn = self.conn()?;
        let changed = conn.execute(
            &format!(
                r#"INSERT OR IGNORE INTO "{}" (doc_id, url, ingested_at, document)
                   VALUES (?1, ?2, ?3, ?4)"#,
                self.collection
            ),
            params![
                document_id(&record.url),
                record.url,
                ingested_at_key(&record.ingested_at),
                document
            ],
        )?;

        if changed == 0 {
            debug!("Skipped existing document: {}", record.url);
            Ok(InsertOutcome::Skipped)
        } else {
            debug!("Inserted document: {}", record.url);
            Ok(InsertOutcome::Inserted)
        }
    }

    fn find_by_url(&self, url: &str) -> Result<Option<CanonicalRecord>, SinkError> {
        let conn = self.conn()?;
        let document: Option<String> = conn
            .query_row(
                &format!(r#"SELECT document FROM "{}" WHERE url = ?1"#, self.collection),
                params![url],
                |row| row.get(0),
            )
            .optional()?;
        match document {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn count(&self) -> Result<usize, SinkError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            &format!(r#"SELECT COUNT(*) FROM "{}""#, self.collection),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn stats(&self) -> Result<CollectionStats, SinkError> {
        let conn = self.conn()?;
        let table = &self.collection;

        let (total, latest): (i64, Option<String>) = conn.query_row(
            &format!(r#"SELECT COUNT(*), MAX(ingested_at) FROM "{table}""#),
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stats = CollectionStats {
            total: total as usize,
            latest_ingested_at: latest.as_deref().and_then(parse_ingested_at),
            ..CollectionStats::default()
        };

        let mut by_status = conn.prepare(&format!(
            r#"SELECT json_extract(document, '$.url_status'), COUNT(*)
               FROM "{table}" GROUP BY 1"#
        ))?;
        let rows = by_status.query_map([], |row| {
            Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, n) = row?;
            let status = status.as_deref().map_or(UrlStatus::Unknown, UrlStatus::parse);
            *stats.by_status.entry(status).or_insert(0) += n as usize;
        }

        let mut top_threats = conn.prepare(&format!(
            r#"SELECT json_extract(document, '$.threat') AS threat, COUNT(*) AS n
               FROM "{table}"
               WHERE json_extract(document, '$.threat') IS NOT NULL
               GROUP BY threat
               ORDER BY n DESC, threat ASC
               LIMIT ?1"#
        ))?;
        let rows = top_threats.query_map(params![TOP_THREATS as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (threat, n) = row?;
            stats.top_threats.push((threat, n as usize));
        }

        Ok(stats)
    }
}

/// Fixed-width UTC timestamp so `MAX(ingested_at)` orders correctly as text
fn ingested_at_key(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ingested_at(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Stable document id: hex sha256 of the dedup key
pub fn document_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

fn database_path(config: &StoreConfig) -> PathBuf {
    PathBuf::from(&config.uri).join(format!("{}.db", config.database))
}

fn validate_name(kind: &str, name: &str) -> Result<(), SinkError> {
    let pattern = Regex::new(NAME_PATTERN)
        .map_err(|e| SinkError::InvalidName(format!("bad name pattern: {e}")))?;
    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(SinkError::InvalidName(format!("{kind} '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UrlStatus;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn memory_config() -> StoreConfig {
        StoreConfig {
            uri: IN_MEMORY_URI.to_string(),
            database: "etl_database".to_string(),
            collection: "urlhaus_raw".to_string(),
        }
    }

    fn record(url: &str) -> CanonicalRecord {
        CanonicalRecord {
            url: url.to_string(),
            url_id: Some("1".to_string()),
            url_status: UrlStatus::Offline,
            date_added: Some(Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap()),
            threat: Some("malware_download".to_string()),
            tags: vec!["elf".to_string(), "mozi".to_string()],
            reporter: Some("abuse_ch".to_string()),
            source: "test".to_string(),
            ingested_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_insert_then_skip() {
        let sink = SqliteSink::open(&memory_config()).unwrap();
        assert_eq!(sink.insert_if_absent(&record("http://a")).unwrap(), InsertOutcome::Inserted);
        assert_eq!(sink.insert_if_absent(&record("http://a")).unwrap(), InsertOutcome::Skipped);
        assert_eq!(sink.count().unwrap(), 1);
    }

    #[test]
    fn test_document_round_trips() {
        let sink = SqliteSink::open(&memory_config()).unwrap();
        let original = record("http://evil.example/a");
        sink.insert_if_absent(&original).unwrap();
        assert_eq!(sink.find_by_url("http://evil.example/a").unwrap(), Some(original));
        assert_eq!(sink.find_by_url("http://elsewhere").unwrap(), None);
    }

    #[test]
    fn test_rejects_invalid_collection_name() {
        let mut config = memory_config();
        config.collection = "urls; DROP TABLE x".to_string();
        assert!(matches!(SqliteSink::open(&config), Err(SinkError::InvalidName(_))));
    }

    #[test]
    fn test_unusable_endpoint_is_unreachable() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "x").unwrap();

        let config = StoreConfig {
            uri: blocker.display().to_string(),
            ..memory_config()
        };
        assert!(matches!(SqliteSink::open(&config), Err(SinkError::Unreachable(_))));
    }

    #[test]
    fn test_network_uri_endpoint_is_unreachable() {
        let config = StoreConfig {
            uri: "mongodb://localhost:27017/".to_string(),
            ..memory_config()
        };
        assert!(matches!(SqliteSink::open(&config), Err(SinkError::Unreachable(_))));
    }

    #[test]
    fn test_stats_aggregate_collection() {
        let sink = SqliteSink::open(&memory_config()).unwrap();
        let mut online = record("http://b");
        online.url_status = UrlStatus::Online;
        online.ingested_at = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let mut phishing = record("http://c");
        phishing.threat = Some("phishing".to_string());
        let mut unlabelled = record("http://d");
        unlabelled.threat = None;
        sink.load(&[record("http://a"), online.clone(), phishing, unlabelled]).unwrap();

        let stats = sink.stats().unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_status.get(&UrlStatus::Offline), Some(&3));
        assert_eq!(stats.by_status.get(&UrlStatus::Online), Some(&1));
        assert_eq!(
            stats.top_threats,
            vec![
                ("malware_download".to_string(), 2),
                ("phishing".to_string(), 1)
            ]
        );
        assert_eq!(stats.latest_ingested_at, Some(online.ingested_at));
    }

    #[test]
    fn test_stats_latest_orders_sub_second_stamps() {
        let sink = SqliteSink::open(&memory_config()).unwrap();
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut whole = record("http://a");
        whole.ingested_at = base;
        let mut fractional = record("http://b");
        fractional.ingested_at = base + chrono::Duration::milliseconds(250);
        sink.load(&[fractional.clone(), whole]).unwrap();

        assert_eq!(
            sink.stats().unwrap().latest_ingested_at,
            Some(fractional.ingested_at)
        );
    }

    #[test]
    fn test_stats_on_empty_collection() {
        let sink = SqliteSink::open(&memory_config()).unwrap();
        assert_eq!(sink.stats().unwrap(), CollectionStats::default());
    }

    #[test]
    fn test_document_id_is_stable_hex() {
        let id = document_id("http://a");
        assert_eq!(id.len(), 64);
        assert_eq!(id, document_id("http://a"));
        assert_ne!(id, document_id("http://b"));
    }
}
