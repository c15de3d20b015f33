//! Page-offset pagination for the alerts adapter, per spec.md §4.7's "Alert
//! adapter variation": no time filtering, and pagination stops as soon as a
//! page comes back short, since prior pages are assumed immutable once
//! under-full (flagged, not revisited, per spec.md §9 Open Questions).

use tracing::{info, warn};

use crate::adapter::AlertsAdapter;
use crate::cursor::PageOffsetCursor;
use crate::driver::Outcome;
use crate::engine::{Engine, DEADLINE_SAFETY_OFFSET};
use crate::state;

pub async fn run(adapter: &dyn AlertsAdapter, engine: &Engine) -> Outcome {
    match run_inner(adapter, engine).await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(key = %adapter.key(), error = %err, "alerts stream failed");
            Outcome::Failed(err.to_string())
        }
    }
}

async fn run_inner(adapter: &dyn AlertsAdapter, engine: &Engine) -> anyhow::Result<Outcome> {
    let key = adapter.key();
    let mut cursor = state::load_page_offset(engine.kv.as_ref(), &key).await?;
    let client = engine.http_client(engine.atlas_auth());
    let page_size = adapter.page_size();

    loop {
        let request = adapter.build_fetch_params(cursor.page_num);

        let raw = match client.get(&request.url, &request.query, request.accept).await {
            Ok(raw) => raw,
            Err(err) => {
                state::save_page_offset(engine.kv.as_ref(), &key, cursor).await?;
                info!(key = %key, error = %err, "alerts request failed, checkpointed");
                return Ok(Outcome::Failed(err.to_string()));
            }
        };

        let items = adapter.transform(raw)?;
        let count = items.len() as u32;

        if !items.is_empty() {
            let send_options = adapter.send_options();
            let sent = engine.sink.send(&items, &send_options).await?;
            if !sent {
                state::save_page_offset(engine.kv.as_ref(), &key, cursor).await?;
                info!(key = %key, "sink rejected alerts payload, checkpointed");
                return Ok(Outcome::Failed("sink rejected payload".to_string()));
            }
        }

        let page_was_full = page_size > 0 && count % page_size == 0 && count > 0;

        if page_was_full {
            cursor.page_num += 1;
            cursor.last_page_offset = 0;

            if !engine.deadline.is_time_remaining(DEADLINE_SAFETY_OFFSET) {
                state::save_page_offset(engine.kv.as_ref(), &key, cursor).await?;
                info!(key = %key, "runtime deadline reached, checkpointed");
                return Ok(Outcome::Done);
            }
        } else {
            cursor.last_page_offset = count;
            state::save_page_offset(engine.kv.as_ref(), &key, cursor).await?;
            return Ok(Outcome::Done);
        }
    }
}
