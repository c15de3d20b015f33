//! Process-wide runtime deadline, per spec.md §4.11, grounded in
//! `sumoclient/base.py::BaseAPI.is_time_remaining` and its
//! `get_function_timeout` environment table.

use std::time::{Duration, Instant};

use config::Environment;

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn starting_now(environment: Environment) -> Self {
        Deadline {
            start: Instant::now(),
            budget: environment.budget(),
        }
    }

    #[cfg(test)]
    fn with_budget(budget: Duration) -> Self {
        Deadline {
            start: Instant::now(),
            budget,
        }
    }

    /// Backdates `start` by `elapsed` so tests can simulate a deadline partway
    /// through its budget without sleeping.
    #[cfg(test)]
    fn with_elapsed(budget: Duration, elapsed: Duration) -> Self {
        Deadline {
            start: Instant::now() - elapsed,
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// `true` while there is still at least `safety_offset` of budget left
    /// beyond the time already elapsed.
    pub fn is_time_remaining(&self, safety_offset: Duration) -> bool {
        match self.budget.checked_sub(self.elapsed()) {
            Some(remaining) => remaining > safety_offset,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_host_never_expires() {
        let deadline = Deadline::starting_now(Environment::OnHost);
        assert!(deadline.is_time_remaining(Duration::from_secs(3600)));
    }

    #[test]
    fn expired_budget_reports_no_time_remaining() {
        // Budget already consumed below the safety offset.
        let deadline = Deadline::with_budget(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(10));
        assert!(!deadline.is_time_remaining(Duration::from_secs(1)));
    }

    #[test]
    fn safety_offset_is_honored() {
        // 4:55 elapsed out of a 5:00 budget leaves 5s remaining, under the
        // 10s safety offset.
        let deadline = Deadline::with_elapsed(
            Duration::from_secs(5 * 60),
            Duration::from_secs(5 * 60 - 5),
        );
        assert!(!deadline.is_time_remaining(Duration::from_secs(10)));
    }
}
