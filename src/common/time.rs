use std::time::{Duration, Instant};

/// A fixed point in time that a retried wait must not run past.
pub struct Deadline {
    deadline: Instant,
}

impl Deadline {
    pub fn after_millis(milliseconds: u32) -> Self {
        Self {
            deadline: Instant::now() + Duration::from_millis(u64::from(milliseconds)),
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Remaining time rounded up to whole milliseconds, as `epoll_wait` wants it.
    pub fn remaining_millis(&self) -> i32 {
        let remaining = self.remaining();
        let mut millis = remaining.as_millis();
        if remaining.subsec_nanos() % 1_000_000 != 0 {
            millis += 1;
        }
        millis.min(i32::MAX as u128) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_deadline_is_expired() {
        let deadline = Deadline::after_millis(0);
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining_millis(), 0);
    }

    #[test]
    fn test_remaining_never_exceeds_request() {
        let deadline = Deadline::after_millis(250);
        assert!(deadline.remaining_millis() <= 250);
        assert!(!deadline.is_expired());
    }
}
