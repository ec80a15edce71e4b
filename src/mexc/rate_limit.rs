// =============================================================================
// Request Throttle — spaces MEXC REST calls to stay under the API rate limit
// =============================================================================
//
// Every outgoing request waits for its slot: slots are handed out at least
// `min_interval` apart, in arrival order. Counters are atomic so any task may
// read them without taking the slot lock.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Waits logged above this threshold.
const SLOW_WAIT_LOG_MS: u128 = 250;

/// Throttle handing out evenly spaced request slots.
pub struct RequestThrottle {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
    requests_sent: AtomicU64,
    requests_delayed: AtomicU64,
}

/// Immutable snapshot of the throttle counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleSnapshot {
    pub min_interval_ms: u64,
    pub requests_sent: u64,
    pub requests_delayed: u64,
}

impl RequestThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
            requests_sent: AtomicU64::new(0),
            requests_delayed: AtomicU64::new(0),
        }
    }

    /// Wait until the caller may send its next request.
    pub async fn acquire(&self) {
        let mut next_slot = self.next_slot.lock().await;
        let now = Instant::now();

        if let Some(slot) = *next_slot {
            if slot > now {
                let wait = slot - now;
                self.requests_delayed.fetch_add(1, Ordering::Relaxed);
                if wait.as_millis() >= SLOW_WAIT_LOG_MS {
                    debug!(wait_ms = wait.as_millis() as u64, "request throttled");
                }
                tokio::time::sleep(wait).await;
            }
        }

        *next_slot = Some(Instant::now() + self.min_interval);
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ThrottleSnapshot {
        ThrottleSnapshot {
            min_interval_ms: self.min_interval.as_millis() as u64,
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_delayed: self.requests_delayed.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottle")
            .field("min_interval", &self.min_interval)
            .field("requests_sent", &self.requests_sent.load(Ordering::Relaxed))
            .field("requests_delayed", &self.requests_delayed.load(Ordering::Relaxed))
            .finish()
    }
}
