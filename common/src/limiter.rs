//! Rate limiting of outgoing requests

use std::time::Duration;
use tokio::{sync::Mutex, time::Instant};

/// A token bucket allowing `rate` operations per second, with a burst size
/// of one.
///
/// Callers await [`RateLimiter::acquire`] before performing the operation.
pub struct RateLimiter {
    period: Duration,
    next: Mutex<Instant>,
}

impl RateLimiter {
    /// Create a new limiter. `rate` must be greater than zero.
    pub fn new(rate: f64) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / rate),
            next: Mutex::new(Instant::now()),
        }
    }

    /// Wait until the next token is available.
    pub async fn acquire(&self) {
        let mut next = self.next.lock().await;
        let now = Instant::now();
        if *next > now {
            tokio::time::sleep_until(*next).await;
        }
        *next = (*next).max(now) + self.period;
    }
}
