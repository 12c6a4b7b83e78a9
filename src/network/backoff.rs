//! Reconnect delay schedule for the live channel.

use std::time::Duration;

/// Exponential backoff: `min(max, 2^attempt * base)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before reconnect number `attempt` (1 for the first retry).
    #[inline]
    pub fn delay(&self, attempt: u32) -> Duration {
        // 2^31 seconds already dwarfs any sane cap.
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}
