use std::time::Duration;

/// Exponential backoff schedule: the delay doubles with each consecutive
/// failure, starting at `base` and never exceeding `max`.
///
/// A zero `base` disables waiting entirely (immediate retry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub const IMMEDIATE: Self = Self {
        base: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn from_millis(base_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(base_ms), Duration::from_millis(max_ms))
    }

    /// Delay to observe after `failures` consecutive failures.
    ///
    /// `failures == 0` always yields zero.
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 || self.base.is_zero() {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(failures - 1);
        self.base.saturating_mul(factor).min(self.max.max(self.base))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::IMMEDIATE
    }
}
