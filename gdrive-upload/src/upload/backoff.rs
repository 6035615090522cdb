use rand::Rng;
use std::time::Duration;

/// Delay inserted between a failed attempt and its retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: bool,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter: bool) -> Self {
        Self { base, max, jitter }
    }

    /// Retries immediately.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, false)
    }

    pub fn is_none(&self) -> bool {
        self.base.is_zero() || self.max.is_zero()
    }

    /// Delay before retry number `retry` (zero-based).
    pub fn delay(&self, retry: u32) -> Duration {
        if self.is_none() {
            return Duration::ZERO;
        }
        let mut rng = rand::thread_rng();
        self.delay_with_rng(retry, &mut rng)
    }

    pub fn delay_with_rng<R: Rng + ?Sized>(&self, retry: u32, rng: &mut R) -> Duration {
        let ceiling = self.base.saturating_mul(1 << retry.min(16)).min(self.max);
        if !self.jitter || ceiling.is_zero() {
            return ceiling;
        }
        // Keep at least half of the computed delay.
        let ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rng.gen_range(ceiling_ms / 2..=ceiling_ms))
    }
}
