//! Stream adapter capabilities, per spec.md §4.5 and DESIGN NOTES §9's
//! "adapters are records of function pointers / capability values" guidance.
//! Concrete adapters (`adapters::*`) implement one of the three capability
//! traits below; the matching driver (`driver::*`) consumes it. There is no
//! adapter base class — a `Log` adapter and a `ProjectEvents` adapter share
//! nothing but `Identity` and the types they exchange with their driver.

use std::time::Duration;

use http::Accept;
use sink::{Element, SendOptions};

/// Parameters for a single upstream request, the adapter's
/// `build_fetch_params` output from spec.md §4.5.
pub struct FetchRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub accept: Accept,
}

/// Identity and publication-delay table shared by every adapter kind,
/// unifying what spec.md §4.6 calls `check_move_fetch_window` into one
/// place instead of duplicating it per adapter.
pub trait Identity: Send + Sync {
    /// The KV key holding this stream's cursor, per spec.md §6's layout.
    fn key(&self) -> String;

    /// How long after a record is produced upstream it becomes visible via
    /// the API; an empty window older than this may be safely skipped past.
    fn publication_delay(&self) -> Duration;
}

/// Implemented by the log and metric adapters (single-fetch driver,
/// spec.md §4.6). Cursor is always a `SimpleTimeCursor`.
pub trait SingleFetchAdapter: Identity {
    fn build_fetch_params(&self, start: f64, end: f64) -> FetchRequest;
    fn send_options(&self) -> SendOptions;
    /// Parses the raw response into sink-ready elements plus the maximum
    /// observed timestamp (`None` if the response carried no timestamped
    /// records, distinct from an empty body).
    fn transform(&self, raw: http::ClientResponse) -> anyhow::Result<(Vec<Element>, Option<f64>)>;
    /// 0.001 for millisecond-precision upstream APIs, 1.0 for second-precision.
    fn moving_window_delta(&self) -> f64;
}

/// Implemented by the event adapters (paginated driver, spec.md §4.7).
/// Cursor is always a `WindowedPaginatedCursor`.
pub trait PaginatedAdapter: Identity {
    fn build_fetch_params(&self, start: f64, end: f64, page_num: u32) -> FetchRequest;
    fn send_options(&self) -> SendOptions;
    fn transform(&self, raw: http::ClientResponse) -> anyhow::Result<(Vec<Element>, Option<f64>)>;
    fn moving_window_delta(&self) -> f64;
}

/// Implemented by the alerts adapter (page-offset driver variation,
/// spec.md §4.7 "Alert adapter variation"). Cursor is a `PageOffsetCursor`.
pub trait AlertsAdapter: Identity {
    fn build_fetch_params(&self, page_num: u32) -> FetchRequest;
    fn send_options(&self) -> SendOptions;
    fn transform(&self, raw: http::ClientResponse) -> anyhow::Result<Vec<Element>>;
    fn page_size(&self) -> u32;
}
