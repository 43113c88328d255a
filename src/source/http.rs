use super::{extract_records, RecordSource};
use crate::error::SourceError;
use crate::types::RawRecord;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use std::time::Duration;
use tracing::{debug, info, instrument};

pub const DEFAULT_USER_AGENT: &str = concat!("urlhaus-etl/", env!("CARGO_PKG_VERSION"));

/// Fetches the feed document over HTTP in a single GET
pub struct HttpSource {
    client: Client,
    url: String,
    records_field: String,
}

impl HttpSource {
    pub fn new(
        url: impl Into<String>,
        records_field: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            records_field: records_field.into(),
        })
    }
}

impl RecordSource for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    #[instrument(skip(self), fields(url = %self.url))]
    fn read(&self) -> Result<Vec<RawRecord>, SourceError> {
        debug!("Fetching feed document");
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes()?;
        debug!("Received {} bytes", body.len());
        let document: serde_json::Value = serde_json::from_slice(&body)?;
        let records = extract_records(document, &self.records_field)?;
        info!("Fetched {} raw records", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Answer a single request with a canned response. The handle yields the
    /// request head, lowercased.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/feed.json", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).to_lowercase()
        });

        (url, handle)
    }

    fn source(url: &str) -> HttpSource {
        HttpSource::new(url, "urls", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_http_source_describes_url() {
        let source = source("http://127.0.0.1:1/feed.json");
        assert_eq!(source.describe(), "http://127.0.0.1:1/feed.json");
    }

    #[test]
    fn test_http_source_unreachable_host_is_source_error() {
        let source = HttpSource::new("http://127.0.0.1:1/feed.json", "urls", Duration::from_secs(2))
            .unwrap();
        assert!(matches!(source.read(), Err(SourceError::Http(_))));
    }

    #[test]
    fn test_http_source_reads_records_from_ok_response() {
        let (url, server) = serve_once("200 OK", r#"{"urls":[{"url":"http://a"}]}"#);
        let records = source(&url).read().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["url"], "http://a");

        let request = server.join().unwrap();
        assert!(request.starts_with("get /feed.json"));
        assert!(request.contains("accept: application/json"));
        assert!(request.contains(&format!("user-agent: {}", DEFAULT_USER_AGENT)));
    }

    #[test]
    fn test_http_source_non_success_status_is_status_error() {
        let (url, server) = serve_once("500 Internal Server Error", r#"{"error":"down"}"#);
        match source(&url).read() {
            Err(SourceError::Status { url: failed, status }) => {
                assert_eq!(status, 500);
                assert_eq!(failed, url);
            }
            other => panic!("expected a status error, got {:?}", other),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_http_source_malformed_body_is_json_error() {
        let (url, server) = serve_once("200 OK", "{not json");
        assert!(matches!(source(&url).read(), Err(SourceError::Json(_))));
        server.join().unwrap();
    }
}
