pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod transform;
pub mod types;

pub use config::Config;
pub use error::{EtlError, Result, SinkError, SourceError};
pub use pipeline::Pipeline;
pub use types::{CanonicalRecord, LoadReport, RawRecord, RunSummary, UrlStatus};
