use crate::config::catalog::RateLimitConfig;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Local, per-client request throttle. Waiting only suspends the calling task.
#[derive(Debug)]
pub enum RateLimiter {
    Unlimited,
    MinInterval {
        interval: Duration,
        last: Mutex<Option<Instant>>,
    },
    SlidingWindow {
        max_requests: usize,
        window: Duration,
        sent: Mutex<VecDeque<Instant>>,
    },
}

impl RateLimiter {
    pub fn from_config(config: Option<&RateLimitConfig>) -> Self {
        match config {
            None => RateLimiter::Unlimited,
            Some(RateLimitConfig::MinInterval { interval_ms }) => {
                Self::min_interval(Duration::from_millis(*interval_ms))
            }
            Some(RateLimitConfig::SlidingWindow {
                max_requests,
                window_seconds,
            }) => Self::sliding_window(*max_requests as usize, Duration::from_secs(*window_seconds)),
        }
    }

    pub fn min_interval(interval: Duration) -> Self {
        RateLimiter::MinInterval {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn sliding_window(max_requests: usize, window: Duration) -> Self {
        RateLimiter::SlidingWindow {
            max_requests: max_requests.max(1),
            window,
            sent: Mutex::new(VecDeque::new()),
        }
    }

    /// Waits until one more request is allowed and records it.
    pub async fn acquire(&self) {
        match self {
            RateLimiter::Unlimited => {}
            RateLimiter::MinInterval { interval, last } => {
                // 睡眠期間持有鎖，讓並發呼叫依序排隊
                let mut last = last.lock().await;
                if let Some(previous) = *last {
                    let next = previous + *interval;
                    if Instant::now() < next {
                        tracing::debug!("⏳ Throttling for {:?}", next - Instant::now());
                        sleep_until(next).await;
                    }
                }
                *last = Some(Instant::now());
            }
            RateLimiter::SlidingWindow {
                max_requests,
                window,
                sent,
            } => {
                let mut sent = sent.lock().await;
                loop {
                    let now = Instant::now();
                    while let Some(oldest) = sent.front() {
                        if now.duration_since(*oldest) >= *window {
                            sent.pop_front();
                        } else {
                            break;
                        }
                    }

                    if sent.len() < *max_requests {
                        sent.push_back(now);
                        return;
                    }

                    if let Some(oldest) = sent.front().copied() {
                        let reset_at = oldest + *window;
                        tracing::debug!(
                            "⏳ Window full ({} requests), waiting {:?}",
                            sent.len(),
                            reset_at - now
                        );
                        sleep_until(reset_at).await;
                    }
                }
            }
        }
    }
}
