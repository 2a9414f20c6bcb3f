//! Minimum-interval limiter for outbound analysis calls.
//!
//! Callers queue on an async mutex that stays held across the sleep, so
//! concurrent calls are serialized and no two calls start closer together
//! than the configured interval.

use super::clock::Clock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>, min_interval: Duration) -> Self {
        Self {
            clock,
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a call may start, then record it. Returns how long we waited.
    pub async fn acquire(&self) -> Duration {
        let mut last = self.last_call.lock().await;

        let mut waited = Duration::ZERO;
        if let Some(prev) = *last {
            let elapsed = self.clock.now().saturating_duration_since(prev);
            if elapsed < self.min_interval {
                waited = self.min_interval - elapsed;
                debug!("rate limiter: waiting {}ms", waited.as_millis());
                self.clock.sleep(waited).await;
            }
        }

        *last = Some(self.clock.now());
        waited
    }
}
