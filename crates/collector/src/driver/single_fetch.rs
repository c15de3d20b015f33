//! One-shot fetch → transform → send → commit cursor, per spec.md §4.6.
//! Drives any [`SingleFetchAdapter`] — logs and the three metric kinds.

use tracing::{info, warn};

use crate::adapter::SingleFetchAdapter;
use crate::driver::Outcome;
use crate::engine::Engine;
use crate::state;
use crate::time::{self, WindowParams};

pub async fn run(adapter: &dyn SingleFetchAdapter, engine: &Engine) -> Outcome {
    match run_inner(adapter, engine).await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(key = %adapter.key(), error = %err, "single-fetch stream failed");
            Outcome::Failed(err.to_string())
        }
    }
}

async fn run_inner(adapter: &dyn SingleFetchAdapter, engine: &Engine) -> anyhow::Result<Outcome> {
    let key = adapter.key();
    let backfill_seconds = (engine.config.collection.backfill_days * 86_400) as f64;
    let default_epoch = time::now_epoch() - backfill_seconds;

    let cursor = state::load_simple_time(engine.kv.as_ref(), &key, default_epoch).await?;

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

    let request = adapter.build_fetch_params(window.start, window.end);
    let client = engine.http_client(engine.atlas_auth());

    let raw = match client.get(&request.url, &request.query, request.accept).await {
        Ok(raw) => raw,
        Err(err) => {
            info!(key = %key, error = %err, "single-fetch request failed, cursor unchanged");
            return Ok(Outcome::Failed(err.to_string()));
        }
    };

    let (items, observed_last_time_epoch) = adapter.transform(raw)?;

    if items.is_empty() {
        let publication_cutoff = time::now_epoch() - adapter.publication_delay().as_secs_f64();
        if window.end < publication_cutoff {
            state::save_simple_time(
                engine.kv.as_ref(),
                &key,
                crate::cursor::SimpleTimeCursor {
                    last_time_epoch: window.end,
                },
            )
            .await?;
        }
        return Ok(Outcome::Done);
    }

    let send_options = adapter.send_options();
    let sent = engine.sink.send(&items, &send_options).await?;

    if sent {
        let last_time_epoch = observed_last_time_epoch.unwrap_or(window.end);
        state::save_simple_time(
            engine.kv.as_ref(),
            &key,
            crate::cursor::SimpleTimeCursor { last_time_epoch },
        )
        .await?;
        Ok(Outcome::Done)
    } else {
        info!(key = %key, "sink rejected payload, cursor left unchanged for retry");
        Ok(Outcome::Failed("sink rejected payload".to_string()))
    }
}
