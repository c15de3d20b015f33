//! Epoch arithmetic and window computation, per spec.md §4.4. Everything is
//! UTC unix seconds as `f64`, so the sub-second `MOVING_WINDOW_DELTA` used by
//! millisecond-precision APIs round-trips exactly through the cursor.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Delta added to the previous cursor to avoid re-fetching the boundary
/// record. Millisecond-precision upstream APIs (events, metrics) use the
/// smaller value; second-precision APIs (logs) use a full second.
pub const MOVING_WINDOW_DELTA_MS: f64 = 0.001;
pub const MOVING_WINDOW_DELTA_SEC: f64 = 1.0;

pub fn now_epoch() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

pub fn epoch_to_datetime(epoch: f64) -> DateTime<Utc> {
    DateTime::from_timestamp(epoch.trunc() as i64, ((epoch.fract()) * 1e9) as u32)
        .unwrap_or_else(Utc::now)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub start: f64,
    pub end: f64,
}

impl Window {
    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

pub struct WindowParams {
    pub moving_window_delta: f64,
    pub end_time_safety_offset_seconds: i64,
    pub min_request_window_length: i64,
    pub max_request_window_length: i64,
}

/// Implements spec.md §4.4's five numbered steps. `sleep` is injected so
/// tests can run the degenerate first-run loop without actually waiting.
pub async fn compute_window<F, Fut>(
    last_time_epoch: f64,
    params: &WindowParams,
    now: impl Fn() -> f64,
    sleep: F,
) -> Window
where
    F: Fn(Duration) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let start = last_time_epoch + params.moving_window_delta;
    let mut end = now() - params.end_time_safety_offset_seconds as f64;

    while end - start <= params.min_request_window_length as f64 {
        sleep(Duration::from_secs(params.min_request_window_length.max(0) as u64)).await;
        end = now() - params.end_time_safety_offset_seconds as f64;
    }

    if end - start > params.max_request_window_length as f64 {
        end = start + params.max_request_window_length as f64;
    }

    Window { start, end }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn clamps_to_max_window() {
        let params = WindowParams {
            moving_window_delta: MOVING_WINDOW_DELTA_SEC,
            end_time_safety_offset_seconds: 0,
            min_request_window_length: 10,
            max_request_window_length: 100,
        };
        let window = compute_window(
            0.0,
            &params,
            || 10_000.0,
            |_| async {},
        )
        .await;
        assert_eq!(window.start, 1.0);
        assert_eq!(window.end, 101.0);
        assert!(window.length() <= 100.0);
    }

    #[tokio::test]
    async fn waits_out_a_too_small_window_then_proceeds() {
        let params = WindowParams {
            moving_window_delta: MOVING_WINDOW_DELTA_SEC,
            end_time_safety_offset_seconds: 0,
            min_request_window_length: 5,
            max_request_window_length: 1000,
        };
        let calls = Cell::new(0);
        let now = || {
            let n = calls.get();
            calls.set(n + 1);
            // First call returns a window too small; second call returns a
            // sufficiently large one.
            if n == 0 {
                2.0
            } else {
                100.0
            }
        };
        let slept = Cell::new(false);
        let window = compute_window(0.0, &params, now, |_| {
            slept.set(true);
            async {}
        })
        .await;
        assert!(slept.get());
        assert_eq!(window.start, 1.0);
        assert_eq!(window.end, 100.0);
    }

    #[test]
    fn epoch_to_datetime_preserves_seconds() {
        let dt = epoch_to_datetime(1_690_329_600.0);
        assert_eq!(dt.timestamp(), 1_690_329_600);
    }
}
