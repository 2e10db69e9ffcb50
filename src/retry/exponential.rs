use super::BackoffPolicy;
use std::time::Duration;

/// 指数退避策略
///
/// 第 n 次失败等待 `base_delay * 2^(n-1)`，不超过 `max_delay`
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(1u64 << shift);
        Duration::from_millis(delay_ms).min(self.max_delay)
    }
}
