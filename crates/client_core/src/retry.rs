use std::time::Duration;

pub const DEFAULT_RECONNECT_UNIT: Duration = Duration::from_secs(5);

/// Linear reconnect backoff: attempt `n` waits `n * unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    unit: Duration,
}

impl ReconnectPolicy {
    pub fn new(unit: Duration) -> Self {
        Self { unit }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.unit.saturating_mul(attempt)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_UNIT)
    }
}
