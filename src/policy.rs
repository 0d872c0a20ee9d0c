use std::time::Duration;

/// Default budget for one resolution or assertion (5 seconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default polling cadence between page queries (100ms).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Per-call wait configuration. Attached to each `resolve`/`act`/
/// `assert_state` invocation; the engine holds no global wait state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Upper bound for the whole call. Every wait loop in the engine is
    /// bounded by this; nothing blocks indefinitely.
    pub timeout: Duration,
    /// Sleep between polls of the page.
    pub poll_interval: Duration,
    /// Only count a match as resolved if it is currently visible.
    pub require_visible: bool,
    /// Only count a match as resolved if it is currently enabled.
    pub require_enabled: bool,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            require_visible: true,
            require_enabled: true,
        }
    }
}

impl WaitPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout = Duration::from_millis(timeout_ms);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_require_visible(mut self, require_visible: bool) -> Self {
        self.require_visible = require_visible;
        self
    }

    pub fn with_require_enabled(mut self, require_enabled: bool) -> Self {
        self.require_enabled = require_enabled;
        self
    }

    /// Time left of the budget given when the call started.
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.timeout.saturating_sub(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = WaitPolicy::default();
        assert_eq!(policy.timeout, Duration::from_millis(5_000));
        assert_eq!(policy.poll_interval, Duration::from_millis(100));
        assert!(policy.require_visible);
        assert!(policy.require_enabled);
    }

    #[test]
    fn test_builders_chain() {
        let policy = WaitPolicy::new()
            .with_timeout_ms(1_000)
            .with_poll_interval(Duration::from_millis(20))
            .with_require_visible(false)
            .with_require_enabled(false);
        assert_eq!(policy.timeout, Duration::from_millis(1_000));
        assert_eq!(policy.poll_interval, Duration::from_millis(20));
        assert!(!policy.require_visible);
        assert!(!policy.require_enabled);
    }

    #[test]
    fn test_remaining_saturates() {
        let policy = WaitPolicy::new().with_timeout_ms(100);
        assert_eq!(
            policy.remaining(Duration::from_millis(250)),
            Duration::ZERO
        );
        assert_eq!(
            policy.remaining(Duration::from_millis(40)),
            Duration::from_millis(60)
        );
    }
}
