use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ai_client::AiError;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

// =============================================================================
// Rate limiter
// =============================================================================

/// Async token bucket guarding a remote quota.
///
/// Holds up to `capacity` tokens and regains one every `refill_interval`.
/// Clones share the bucket.
#[derive(Clone)]
pub struct RateLimiter {
    bucket: Option<Arc<Mutex<Bucket>>>,
}

struct Bucket {
    capacity: f64,
    tokens: f64,
    refill_interval: Duration,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let gained = elapsed.as_secs_f64() / self.refill_interval.as_secs_f64();
        self.tokens = (self.tokens + gained).min(self.capacity);
        self.last_refill = now;
    }
}

impl RateLimiter {
    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        if capacity == 0 || refill_interval.is_zero() {
            return Self::unlimited();
        }
        Self {
            bucket: Some(Arc::new(Mutex::new(Bucket {
                capacity: f64::from(capacity),
                tokens: f64::from(capacity),
                refill_interval,
                last_refill: Instant::now(),
            }))),
        }
    }

    /// One call per `interval`: the first is immediate, each later call waits
    /// until `interval` has passed since the previous one.
    pub fn fixed_interval(interval: Duration) -> Self {
        Self::new(1, interval)
    }

    pub fn unlimited() -> Self {
        Self { bucket: None }
    }

    /// Wait for and consume one token.
    pub async fn acquire(&self) {
        let Some(bucket) = &self.bucket else {
            return;
        };

        loop {
            let wait = {
                let mut b = bucket.lock().await;
                b.refill(Instant::now());
                if b.tokens >= 1.0 {
                    b.tokens -= 1.0;
                    return;
                }
                b.refill_interval.mul_f64(1.0 - b.tokens)
            };
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}

// =============================================================================
// Retry policy
// =============================================================================

/// Exponential backoff for transient upstream failures. The default makes a
/// single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }

    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::none()
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op`, retrying transient errors up to `max_retries` times.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, AiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AiError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.delay(attempt);
                    attempt += 1;
                    warn!(
                        label,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient upstream error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
