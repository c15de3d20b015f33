//! The single immutable context threaded through drivers and discovery, per
//! DESIGN NOTES §9: "pass a single immutable `Engine` context that carries
//! configuration, logger, KV handle, sink factory, HTTP client factory, and
//! deadline" in place of the source's module-level globals.

use std::sync::Arc;
use std::time::Duration;

use config::Config;

use crate::deadline::Deadline;

/// Built once per invocation and shared (via `Arc`) across every worker
/// task. Workers never mutate it; each builds its own `http::Client` from
/// `config` rather than sharing one, per spec.md §5's per-worker session rule.
pub struct Engine {
    pub config: Config,
    pub kv: Arc<dyn kv::Store>,
    pub sink: Arc<dyn sink::Sink>,
    pub deadline: Deadline,
}

/// Fixed across every driver, independent of configuration: how much
/// headroom the paginated driver leaves before the deadline check trips.
pub const DEADLINE_SAFETY_OFFSET: Duration = Duration::from_secs(10);

impl Engine {
    pub fn new(config: Config, kv: Arc<dyn kv::Store>, sink: Arc<dyn sink::Sink>) -> Self {
        let deadline = Deadline::starting_now(config.collection.environment);
        Engine {
            config,
            kv,
            sink,
            deadline,
        }
    }

    /// One client per call, per spec.md §4.3's "one session per worker";
    /// callers construct a fresh `Engine::http_client()` inside each worker
    /// task rather than sharing a single instance.
    pub fn http_client(&self, auth: http::Auth) -> http::Client {
        http::Client::new(
            auth,
            self.config.collection.timeout,
            self.config.collection.max_retry,
            self.config.collection.backoff_factor,
        )
    }

    pub fn atlas_auth(&self) -> http::Auth {
        http::Auth::Digest {
            username: self.config.mongodb_atlas.public_key.clone(),
            password: self.config.mongodb_atlas.private_key.clone(),
        }
    }
}
