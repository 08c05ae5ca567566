use crate::config::catalog::RetryConfig;
use crate::utils::error::SkillError;
use rand::Rng;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 500;
const DEFAULT_MAX_DELAY_MS: u64 = 8_000;

/// Exponential backoff shared by every service.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: Option<&RetryConfig>) -> Self {
        let defaults = Self::default();
        match config {
            None => defaults,
            Some(config) => Self {
                max_attempts: config.max_attempts.unwrap_or(defaults.max_attempts).max(1),
                base_delay: config
                    .base_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.base_delay),
                max_delay: config
                    .max_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.max_delay),
                jitter: config.jitter.unwrap_or(defaults.jitter),
            },
        }
    }

    /// Backoff before retry number `attempt` (1-based), without jitter.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Delay to wait after `error` on attempt `attempt`, or `None` to give up.
    pub fn delay_after(&self, attempt: u32, error: &SkillError) -> Option<Duration> {
        if attempt >= self.max_attempts || !error.is_retryable() {
            return None;
        }

        if let Some(seconds) = error.retry_after() {
            return Some(Duration::from_secs(seconds).min(self.max_delay));
        }

        let delay = self.base_backoff(attempt);
        if self.jitter && !delay.is_zero() {
            let half = delay / 2;
            let spread = rand::thread_rng().gen_range(0..=half.as_millis() as u64);
            Some(half + Duration::from_millis(spread))
        } else {
            Some(delay)
        }
    }
}
