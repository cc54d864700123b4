use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::HiveError;

/// How long to wait before retry `attempt` (1-based).
#[derive(Clone)]
pub enum BackoffStrategy {
    Fixed(Duration),
    Linear {
        initial: Duration,
        increment: Duration,
        max: Duration,
    },
    Exponential {
        base: Duration,
        multiplier: f64,
        max: Duration,
    },
    /// Full jitter: uniform over [0, exponential cap].
    ExponentialWithJitter {
        base: Duration,
        multiplier: f64,
        max: Duration,
    },
    /// Decorrelated jitter: uniform over [base, previous × 3], capped.
    DecorrelatedJitter { base: Duration, max: Duration },
    Immediate,
    Custom(Arc<dyn Fn(usize) -> Duration + Send + Sync>),
}

impl BackoffStrategy {
    pub fn exponential(base: Duration, max: Duration) -> Self {
        BackoffStrategy::Exponential {
            base,
            multiplier: 2.0,
            max,
        }
    }

    pub fn delay(&self, attempt: usize) -> Duration {
        let attempt = attempt.max(1);
        match self {
            BackoffStrategy::Fixed(duration) => *duration,
            BackoffStrategy::Linear {
                initial,
                increment,
                max,
            } => (*initial + *increment * (attempt as u32 - 1)).min(*max),
            BackoffStrategy::Exponential {
                base,
                multiplier,
                max,
            } => exponential_delay(*base, *multiplier, *max, attempt),
            BackoffStrategy::ExponentialWithJitter {
                base,
                multiplier,
                max,
            } => {
                let cap = exponential_delay(*base, *multiplier, *max, attempt);
                random_duration(Duration::ZERO, cap)
            }
            BackoffStrategy::DecorrelatedJitter { base, max } => {
                if attempt == 1 {
                    return (*base).min(*max);
                }
                let previous = exponential_delay(*base, 3.0, *max, attempt - 1);
                let upper = previous
                    .checked_mul(3)
                    .map(|upper| upper.min(*max))
                    .unwrap_or(*max);
                random_duration((*base).min(upper), upper)
            }
            BackoffStrategy::Immediate => Duration::ZERO,
            BackoffStrategy::Custom(delay) => delay(attempt),
        }
    }
}

impl fmt::Debug for BackoffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffStrategy::Fixed(d) => write!(f, "Fixed({d:?})"),
            BackoffStrategy::Linear { initial, increment, max } => {
                write!(f, "Linear({initial:?} + {increment:?}, max {max:?})")
            }
            BackoffStrategy::Exponential { base, multiplier, max } => {
                write!(f, "Exponential({base:?} × {multiplier}, max {max:?})")
            }
            BackoffStrategy::ExponentialWithJitter { base, multiplier, max } => {
                write!(f, "ExponentialWithJitter({base:?} × {multiplier}, max {max:?})")
            }
            BackoffStrategy::DecorrelatedJitter { base, max } => {
                write!(f, "DecorrelatedJitter({base:?}, max {max:?})")
            }
            BackoffStrategy::Immediate => write!(f, "Immediate"),
            BackoffStrategy::Custom(_) => write!(f, "Custom"),
        }
    }
}

fn exponential_delay(base: Duration, multiplier: f64, max: Duration, attempt: usize) -> Duration {
    let factor = multiplier.powi(attempt as i32 - 1);
    let scaled = base.as_secs_f64() * factor;
    if !scaled.is_finite() || scaled >= max.as_secs_f64() {
        max
    } else {
        Duration::from_secs_f64(scaled)
    }
}

fn random_duration(lower: Duration, upper: Duration) -> Duration {
    if upper <= lower {
        return lower;
    }
    let millis = rand::thread_rng().gen_range(lower.as_millis()..=upper.as_millis());
    Duration::from_millis(millis.min(u64::MAX as u128) as u64)
}

type ShouldRetry = Arc<dyn Fn(&HiveError) -> bool + Send + Sync>;
type OnRetry = Arc<dyn Fn(usize, &HiveError) + Send + Sync>;

/// Runs an operation up to `1 + max_attempts` times with backoff.
///
/// Control errors (cancellation, timeout, interrupt) always bypass
/// retries. Cancellation is checked before each attempt and during
/// backoff sleeps.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff: BackoffStrategy,
    should_retry: ShouldRetry,
    on_retry: Option<OnRetry>,
}

impl RetryPolicy {
    /// `max_attempts` counts retries after the initial attempt.
    pub fn new(max_attempts: usize, backoff: BackoffStrategy) -> Self {
        Self {
            max_attempts,
            backoff,
            should_retry: Arc::new(HiveError::is_retryable),
            on_retry: None,
        }
    }

    pub fn with_should_retry(
        mut self,
        should_retry: impl Fn(&HiveError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry = Arc::new(should_retry);
        self
    }

    pub fn with_on_retry(
        mut self,
        on_retry: impl Fn(usize, &HiveError) + Send + Sync + 'static,
    ) -> Self {
        self.on_retry = Some(Arc::new(on_retry));
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, HiveError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HiveError>>,
    {
        let never = CancellationToken::new();
        self.execute_cancellable(&never, op).await.map(|(value, _)| value)
    }

    /// Like `execute`, also reporting how many attempts were made.
    pub async fn execute_cancellable<T, F, Fut>(
        &self,
        cancellation: &CancellationToken,
        mut op: F,
    ) -> Result<(T, usize), HiveError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HiveError>>,
    {
        let mut attempts = 0;

        loop {
            if cancellation.is_cancelled() {
                return Err(HiveError::Cancelled);
            }

            attempts += 1;
            match op().await {
                Ok(value) => return Ok((value, attempts)),
                Err(error) if error.is_control() => return Err(error),
                Err(error) => {
                    let retries_left = attempts <= self.max_attempts;
                    if !retries_left || !(self.should_retry)(&error) {
                        return Err(HiveError::RetriesExhausted {
                            attempts,
                            last_error: Box::new(error),
                        });
                    }

                    if let Some(on_retry) = &self.on_retry {
                        on_retry(attempts, &error);
                    }
                    log::debug!(
                        "Attempt {attempts} failed ({error}), retrying after backoff"
                    );

                    let delay = self.backoff.delay(attempts);
                    if !delay.is_zero() {
                        tokio::select! {
                            _ = cancellation.cancelled() => return Err(HiveError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
    }
}
