//! Multi-page fetch loop with mid-run cursor checkpoints, per spec.md §4.7.
//! Drives any [`PaginatedAdapter`] — project/org events.

use tracing::{info, warn};

use crate::adapter::PaginatedAdapter;
use crate::cursor::WindowedPaginatedCursor;
use crate::driver::Outcome;
use crate::engine::{Engine, DEADLINE_SAFETY_OFFSET};
use crate::state;
use crate::time::{self, WindowParams};

pub async fn run(adapter: &dyn PaginatedAdapter, engine: &Engine) -> Outcome {
    match run_inner(adapter, engine).await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(key = %adapter.key(), error = %err, "paginated stream failed");
            Outcome::Failed(err.to_string())
        }
    }
}

async fn run_inner(adapter: &dyn PaginatedAdapter, engine: &Engine) -> anyhow::Result<Outcome> {
    let key = adapter.key();
    let backfill_seconds = (engine.config.collection.backfill_days * 86_400) as f64;
    let default_epoch = time::now_epoch() - backfill_seconds;

    let cursor = state::load_windowed_paginated(engine.kv.as_ref(), &key, default_epoch).await?;

    let (start, end, mut page_num, mut last_time_epoch) = if cursor.is_window_closed() {
        let window_params = WindowParams {
            moving_window_delta: adapter.moving_window_delta(),
            end_time_safety_offset_seconds: engine.config.collection.end_time_safety_offset_seconds,
            min_request_window_length: engine.config.collection.min_request_window_length,
            max_request_window_length: engine.config.collection.max_request_window_length,
        };
        let window = time::compute_window(
            cursor.last_time_epoch,
            &window_params,
            time::now_epoch,
            |d| tokio::time::sleep(d),
        )
        .await;
        (window.start, window.end, 1u32, cursor.last_time_epoch)
    } else {
        (
            cursor.start_time_epoch.unwrap_or(cursor.last_time_epoch),
            cursor.end_time_epoch.unwrap_or(cursor.last_time_epoch),
            cursor.page_num,
            cursor.last_time_epoch,
        )
    };

    let client = engine.http_client(engine.atlas_auth());

    loop {
        let request = adapter.build_fetch_params(start, end, page_num);

        let raw = match client.get(&request.url, &request.query, request.accept).await {
            Ok(raw) => raw,
            Err(err) => {
                checkpoint(engine, &key, start, end, page_num, last_time_epoch).await?;
                info!(key = %key, error = %err, page_num, "paginated request failed, checkpointed");
                return Ok(Outcome::Failed(err.to_string()));
            }
        };

        let (items, observed_last_time_epoch) = adapter.transform(raw)?;

        if items.is_empty() {
            if page_num > 1 {
                state::save_windowed_paginated(
                    engine.kv.as_ref(),
                    &key,
                    WindowedPaginatedCursor::closed(last_time_epoch),
                )
                .await?;
            } else {
                let publication_cutoff =
                    time::now_epoch() - adapter.publication_delay().as_secs_f64();
                let committed = if end < publication_cutoff {
                    end
                } else {
                    last_time_epoch
                };
                state::save_windowed_paginated(
                    engine.kv.as_ref(),
                    &key,
                    WindowedPaginatedCursor::closed(committed),
                )
                .await?;
            }
            return Ok(Outcome::Done);
        }

        let send_options = adapter.send_options();
        let sent = engine.sink.send(&items, &send_options).await?;

        if !sent {
            checkpoint(engine, &key, start, end, page_num, last_time_epoch).await?;
            info!(key = %key, page_num, "sink rejected payload, checkpointed");
            return Ok(Outcome::Failed("sink rejected payload".to_string()));
        }

        page_num += 1;
        last_time_epoch = observed_last_time_epoch.unwrap_or(last_time_epoch);

        if !engine.deadline.is_time_remaining(DEADLINE_SAFETY_OFFSET) {
            checkpoint(engine, &key, start, end, page_num, last_time_epoch).await?;
            info!(key = %key, page_num, "runtime deadline reached, checkpointed");
            return Ok(Outcome::Done);
        }
    }
}

async fn checkpoint(
    engine: &Engine,
    key: &str,
    start: f64,
    end: f64,
    page_num: u32,
    last_time_epoch: f64,
) -> anyhow::Result<()> {
    state::save_windowed_paginated(
        engine.kv.as_ref(),
        key,
        WindowedPaginatedCursor::resuming(last_time_epoch, page_num, start, end),
    )
    .await
}
