use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::HiveError;

#[derive(Debug)]
struct Bucket {
    available: f64,
    last_refill: Instant,
}

/// Token-bucket rate limiter with continuous refill.
///
/// Tokens accrue at `refill_rate` per second up to `max_tokens`;
/// `acquire` consumes one token, sleeping until it is available.
pub struct RateLimiter {
    max_tokens: f64,
    refill_rate: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// `refill_rate` is tokens per second and must be positive.
    pub fn new(max_tokens: u32, refill_rate: f64) -> Self {
        Self {
            max_tokens: max_tokens as f64,
            refill_rate: refill_rate.max(f64::MIN_POSITIVE),
            bucket: Mutex::new(Bucket {
                available: max_tokens as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Consume one token without waiting. Returns `false` when the
    /// bucket holds less than one token.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.lock();
        self.refill(&mut bucket);

        if bucket.available >= 1.0 {
            bucket.available -= 1.0;
            true
        } else {
            false
        }
    }

    /// Consume one token, sleeping until the refill makes one available.
    pub async fn acquire(&self) {
        let never = CancellationToken::new();
        // The never-cancelled token makes this infallible.
        let _ = self.acquire_cancellable(&never).await;
    }

    /// Like `acquire`, aborting the sleep when `cancellation` fires.
    pub async fn acquire_cancellable(
        &self,
        cancellation: &CancellationToken,
    ) -> Result<(), HiveError> {
        loop {
            if cancellation.is_cancelled() {
                return Err(HiveError::Cancelled);
            }
            if self.try_acquire() {
                return Ok(());
            }

            let wait = {
                let mut bucket = self.lock();
                self.refill(&mut bucket);
                let deficit = (1.0 - bucket.available).max(0.0);
                Duration::from_secs_f64(deficit / self.refill_rate)
            };

            tokio::select! {
                _ = cancellation.cancelled() => return Err(HiveError::Cancelled),
                _ = tokio::time::sleep(wait.max(Duration::from_millis(1))) => {}
            }
        }
    }

    /// Tokens currently in the bucket (after refill).
    pub fn available(&self) -> f64 {
        let mut bucket = self.lock();
        self.refill(&mut bucket);
        bucket.available
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.available = (bucket.available + elapsed * self.refill_rate).min(self.max_tokens);
        bucket.last_refill = now;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Bucket> {
        self.bucket.lock().expect("rate limiter bucket poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_up_to_capacity() {
        let limiter = RateLimiter::new(3, 1.0);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_no_overshoot_over_interval() {
        // 2 tokens capacity refilling at 20/s; over 250ms at most
        // ceil(2 + 20 * 0.25) = 7 acquisitions may succeed.
        let limiter = RateLimiter::new(2, 20.0);
        let started = Instant::now();

        let mut acquired = 0;
        while started.elapsed() < Duration::from_millis(250) {
            if limiter.try_acquire() {
                acquired += 1;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        assert!(acquired <= 7, "acquired {acquired} tokens");
        assert!(acquired >= 2);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_refill() {
        let limiter = RateLimiter::new(1, 50.0);
        assert!(limiter.try_acquire());

        let started = Instant::now();
        limiter.acquire().await;
        // Refill of one token at 50/s takes ~20ms.
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_sleep() {
        let limiter = RateLimiter::new(1, 0.001);
        assert!(limiter.try_acquire());

        let cancellation = CancellationToken::new();
        let token = cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let started = Instant::now();
        let result = limiter.acquire_cancellable(&cancellation).await;
        assert!(matches!(result.unwrap_err(), HiveError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
