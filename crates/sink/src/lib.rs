//! Chunked, optionally compressed, retrying delivery of payloads, per
//! spec.md §4.2. Only the interface plus two concrete backends ship here;
//! the originating implementation's file-based sink is an external,
//! unspecified concern and is left to other implementers of [`Sink`].

pub mod http_sink;
pub mod stdout;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink http error: {0}")]
    Http(#[from] http::ClientError),
    #[error("payload element could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("payload could not be compressed: {0}")]
    Compression(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SinkError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKey {
    Logs,
    Metrics,
}

#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub extra_headers: HashMap<String, String>,
    pub endpoint_key: Option<EndpointKey>,
    /// If `true`, each element is JSON-encoded before batching; if `false`,
    /// elements are already-encoded strings (e.g. carbon2 metric lines).
    pub jsondump: bool,
    /// Logical destination name a file-based sink would route this payload
    /// to (e.g. `db_logs.json` vs `db_auditlogs.json`); surfaced to callers
    /// and logged, even though the sinks shipped here are endpoint-keyed
    /// rather than file-keyed.
    pub pathname: Option<String>,
}

/// An element to deliver: either a JSON-serializable record (logs, events)
/// or a pre-encoded text line (carbon2 metrics).
#[derive(Debug, Clone)]
pub enum Element {
    Json(serde_json::Value),
    Text(String),
}

impl Element {
    fn encode(&self, jsondump: bool) -> Result<String> {
        match self {
            Element::Json(v) if jsondump => Ok(serde_json::to_string(v)?),
            Element::Json(v) => Ok(v
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| v.to_string())),
            Element::Text(s) => Ok(s.clone()),
        }
    }
}

#[async_trait]
pub trait Sink: Send + Sync {
    /// Returns `true` only after every chunk of `payload` has been
    /// acknowledged by the remote endpoint.
    async fn send(&self, payload: &[Element], options: &SendOptions) -> Result<bool>;

    async fn close(&self) -> Result<()>;
}
