// Token-bucket pacing per upstream dependency.
//
// Each limiter hands out one token per `interval`, holding at most
// `capacity`. A zero interval never waits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::settings::CollectorSettings;

pub struct RateLimiter {
    interval: Duration,
    capacity: f64,
    bucket: Mutex<Bucket>,
}

struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl RateLimiter {
    pub fn new(interval: Duration, capacity: u32) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            interval,
            capacity,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                refilled_at: Instant::now(),
            }),
        }
    }

    /// One token per interval, no burst.
    pub fn every(interval: Duration) -> Self {
        Self::new(interval, 1)
    }

    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO, 1)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Take one token, sleeping until it is available.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }

        let wait = {
            let mut bucket = self.bucket.lock().await;
            let now = Instant::now();
            let earned =
                now.duration_since(bucket.refilled_at).as_secs_f64() / self.interval.as_secs_f64();
            bucket.tokens = (bucket.tokens + earned).min(self.capacity);
            bucket.refilled_at = now;

            // Reserve the token now; a negative balance is the debt to sleep off.
            bucket.tokens -= 1.0;
            if bucket.tokens >= 0.0 {
                Duration::ZERO
            } else {
                self.interval.mul_f64(-bucket.tokens)
            }
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

/// The limiters the collector uses, one per dependency.
#[derive(Clone)]
pub struct Pacing {
    /// Between sources within one collection cycle.
    pub sources: Arc<RateLimiter>,
    /// Between per-port vessel queries.
    pub ports: Arc<RateLimiter>,
    /// Between per-series economic queries.
    pub series: Arc<RateLimiter>,
    /// Between publish batches.
    pub publish_batches: Arc<RateLimiter>,
}

impl Pacing {
    pub fn from_settings(settings: &CollectorSettings) -> Self {
        Self {
            sources: paced(settings.source_interval_ms),
            ports: paced(settings.port_interval_ms),
            series: paced(settings.series_interval_ms),
            publish_batches: paced(settings.publish_batch_interval_ms),
        }
    }

    /// No waiting anywhere. Used by tests and one-shot CLI calls.
    pub fn immediate() -> Self {
        Self {
            sources: Arc::new(RateLimiter::unlimited()),
            ports: Arc::new(RateLimiter::unlimited()),
            series: Arc::new(RateLimiter::unlimited()),
            publish_batches: Arc::new(RateLimiter::unlimited()),
        }
    }
}

fn paced(interval_ms: u64) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::every(Duration::from_millis(interval_ms)))
}

impl Default for Pacing {
    fn default() -> Self {
        Self::from_settings(&CollectorSettings::default())
    }
}
