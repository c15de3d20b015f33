//! Retry/backoff policy for the upstream and sink HTTP clients. Adapters never
//! retry on their own; every request they issue goes through here once.

use std::time::Duration;

pub use exponential_backoff::Backoff;

/// Status codes worth retrying, per spec.md §4.3.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 502 | 503 | 504 | 429)
}

#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    attempt: u32,
    backoff: Backoff,
}

impl ExponentialBackoff {
    /// `max_retries` bounds the number of retries after the first attempt;
    /// `backoff_factor` scales the base delay the way `BACKOFF_FACTOR` does
    /// in the source (`base * factor^attempt`, expressed here via the
    /// exponential-backoff crate's min/max/factor knobs).
    pub fn new(max_retries: u32, backoff_factor: f32) -> Self {
        let base_millis = (backoff_factor * 1000.0).max(1.0) as u64;
        let mut backoff = Backoff::new(
            max_retries,
            Duration::from_millis(base_millis),
            Some(Duration::from_secs(60)),
        );
        backoff.set_factor(2);
        ExponentialBackoff { attempt: 0, backoff }
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Returns the delay to wait before the next attempt, or `None` once
    /// retries are exhausted.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        self.backoff.next(self.attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses_match_spec() {
        for code in [502, 503, 504, 429] {
            assert!(is_retryable_status(code));
        }
        for code in [200, 400, 401, 403, 404, 500] {
            assert!(!is_retryable_status(code));
        }
    }

    #[test]
    fn exhausts_after_max_retries() {
        let mut backoff = ExponentialBackoff::new(3, 0.1);
        assert!(backoff.next_backoff().is_some());
        assert!(backoff.next_backoff().is_some());
        assert!(backoff.next_backoff().is_some());
        assert!(backoff.next_backoff().is_none());
    }

    #[test]
    fn reset_allows_further_retries() {
        let mut backoff = ExponentialBackoff::new(1, 0.1);
        assert!(backoff.next_backoff().is_some());
        assert!(backoff.next_backoff().is_none());
        backoff.reset();
        assert!(backoff.next_backoff().is_some());
    }
}
