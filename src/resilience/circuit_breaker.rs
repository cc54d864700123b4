use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::{Duration, Instant};

use crate::error::HiveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open { until: Instant },
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open a closed breaker.
    pub failure_threshold: usize,
    /// Consecutive successes that close a half-open breaker.
    pub success_threshold: usize,
    /// How long an open breaker rejects before probing.
    pub reset_timeout: Duration,
    /// Concurrent probes admitted while half-open.
    pub half_open_max_requests: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
            half_open_max_requests: 1,
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: usize,
    consecutive_successes: usize,
    half_open_in_flight: usize,
    total_failures: u64,
    total_successes: u64,
    last_failure_time: Option<Instant>,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            half_open_in_flight: 0,
            total_failures: 0,
            total_successes: 0,
            last_failure_time: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerStatistics {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: usize,
    pub consecutive_successes: usize,
    pub total_failures: u64,
    pub total_successes: u64,
    pub last_failure_time: Option<Instant>,
}

/// Classic three-state circuit breaker.
///
/// Closed counts consecutive failures; at the threshold it opens for
/// `reset_timeout`. The first admission after the timeout moves it to
/// half-open, where at most `half_open_max_requests` probes run at once:
/// enough consecutive successes close it, any failure re-opens it.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn execute<T, Fut>(&self, op: Fut) -> Result<T, HiveError>
    where
        Fut: Future<Output = Result<T, HiveError>>,
    {
        let admitted_half_open = self.admit()?;
        // The guard releases the half-open slot even when this future is
        // dropped mid-flight by a timeout or parent cancellation.
        let _slot = admitted_half_open.then(|| HalfOpenSlot { breaker: self });

        let outcome = op.await;

        let mut inner = self.lock();
        match &outcome {
            Ok(_) => self.on_success(&mut inner),
            Err(error) => {
                // A cancelled op says nothing about the dependency's health.
                if !matches!(error, HiveError::Cancelled) {
                    self.on_failure(&mut inner);
                }
            }
        }

        outcome
    }

    /// Gate one request. Returns whether a half-open slot was taken.
    fn admit(&self) -> Result<bool, HiveError> {
        let mut inner = self.lock();

        if let CircuitState::Open { until } = inner.state {
            if Instant::now() < until {
                return Err(HiveError::CircuitBreakerOpen(self.name.clone()));
            }
            inner.state = CircuitState::HalfOpen;
            inner.consecutive_successes = 0;
            inner.half_open_in_flight = 0;
            log::debug!("Circuit breaker '{}' probing (half-open)", self.name);
        }

        if inner.state == CircuitState::HalfOpen {
            if inner.half_open_in_flight >= self.config.half_open_max_requests {
                return Err(HiveError::CircuitBreakerOpen(self.name.clone()));
            }
            inner.half_open_in_flight += 1;
            return Ok(true);
        }

        Ok(false)
    }

    fn on_success(&self, inner: &mut BreakerInner) {
        inner.total_successes += 1;
        inner.consecutive_failures = 0;
        inner.consecutive_successes += 1;

        if inner.state == CircuitState::HalfOpen
            && inner.consecutive_successes >= self.config.success_threshold
        {
            inner.state = CircuitState::Closed;
            inner.consecutive_successes = 0;
            log::info!("Circuit breaker '{}' closed", self.name);
        }
    }

    fn on_failure(&self, inner: &mut BreakerInner) {
        inner.total_failures += 1;
        inner.consecutive_successes = 0;
        inner.consecutive_failures += 1;
        inner.last_failure_time = Some(Instant::now());

        let should_open = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.consecutive_failures >= self.config.failure_threshold,
            CircuitState::Open { .. } => false,
        };

        if should_open {
            inner.state = CircuitState::Open {
                until: Instant::now() + self.config.reset_timeout,
            };
            inner.consecutive_failures = 0;
            log::warn!(
                "Circuit breaker '{}' opened for {:?}",
                self.name,
                self.config.reset_timeout
            );
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Force the breaker closed, clearing counters.
    pub fn reset(&self) {
        let mut inner = self.lock();
        *inner = BreakerInner {
            total_failures: inner.total_failures,
            total_successes: inner.total_successes,
            last_failure_time: inner.last_failure_time,
            ..BreakerInner::new()
        };
    }

    /// Force the breaker open for one reset timeout.
    pub fn trip(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Open {
            until: Instant::now() + self.config.reset_timeout,
        };
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
    }

    pub fn statistics(&self) -> CircuitBreakerStatistics {
        let inner = self.lock();
        CircuitBreakerStatistics {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            total_failures: inner.total_failures,
            total_successes: inner.total_successes,
            last_failure_time: inner.last_failure_time,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().expect("circuit breaker state poisoned")
    }
}

struct HalfOpenSlot<'a> {
    breaker: &'a CircuitBreaker,
}

impl Drop for HalfOpenSlot<'_> {
    fn drop(&mut self) {
        let mut inner = self.breaker.lock();
        inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
    }
}

/// Process-level collection of named breakers, create-on-first-access.
///
/// Inject a registry where testability matters; [`CircuitBreakerRegistry::global`]
/// is the shared default.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static CircuitBreakerRegistry {
        static GLOBAL: OnceLock<CircuitBreakerRegistry> = OnceLock::new();
        GLOBAL.get_or_init(CircuitBreakerRegistry::new)
    }

    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breaker_with(name, CircuitBreakerConfig::default)
    }

    /// `configure` runs only when the breaker is created; later calls
    /// return the existing breaker untouched.
    pub fn breaker_with(
        &self,
        name: &str,
        configure: impl FnOnce() -> CircuitBreakerConfig,
    ) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.read().get(name) {
            return Arc::clone(existing);
        }

        let mut breakers = self.write();
        Arc::clone(
            breakers
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(name, configure()))),
        )
    }

    pub fn reset_all(&self) {
        for breaker in self.read().values() {
            breaker.reset();
        }
    }

    pub fn remove(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.write().remove(name)
    }

    pub fn remove_all(&self) {
        self.write().clear();
    }

    pub fn all_statistics(&self) -> Vec<CircuitBreakerStatistics> {
        self.read()
            .values()
            .map(|breaker| breaker.statistics())
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<CircuitBreaker>>> {
        self.breakers.read().expect("breaker registry poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<CircuitBreaker>>> {
        self.breakers.write().expect("breaker registry poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 2,
            reset_timeout: Duration::from_millis(50),
            half_open_max_requests: 1,
        }
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), HiveError> {
        breaker
            .execute(async { Err::<(), _>(HiveError::GenerationFailed("down".into())) })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<&'static str, HiveError> {
        breaker.execute(async { Ok("up") }).await
    }

    #[tokio::test]
    async fn test_opens_on_exactly_the_threshold_failure() {
        let breaker = CircuitBreaker::new("api", test_config());

        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);

        let _ = fail(&breaker).await;
        assert!(matches!(breaker.state(), CircuitState::Open { .. }));

        // While open, calls are rejected without running the op.
        let rejected = succeed(&breaker).await;
        assert!(matches!(
            rejected.unwrap_err(),
            HiveError::CircuitBreakerOpen(name) if name == "api"
        ));
    }

    #[tokio::test]
    async fn test_trip_and_recover_through_half_open() {
        let breaker = CircuitBreaker::new("api", test_config());

        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert!(matches!(breaker.state(), CircuitState::Open { .. }));

        tokio::time::sleep(Duration::from_millis(60)).await;

        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert_eq!(breaker.statistics().consecutive_successes, 1);

        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_failure_in_half_open_reopens() {
        let breaker = CircuitBreaker::new("api", test_config());
        breaker.trip();

        tokio::time::sleep(Duration::from_millis(60)).await;
        let _ = fail(&breaker).await;
        assert!(matches!(breaker.state(), CircuitState::Open { .. }));
    }

    #[tokio::test]
    async fn test_half_open_concurrency_limit() {
        let breaker = Arc::new(CircuitBreaker::new("api", test_config()));
        breaker.trip();
        tokio::time::sleep(Duration::from_millis(60)).await;

        // First probe holds the only half-open slot.
        let slow = Arc::clone(&breaker);
        let probe = tokio::spawn(async move {
            slow.execute(async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<_, HiveError>("probe")
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        let rejected = succeed(&breaker).await;
        assert!(matches!(
            rejected.unwrap_err(),
            HiveError::CircuitBreakerOpen(_)
        ));

        probe.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_manual_reset() {
        let breaker = CircuitBreaker::new("api", test_config());
        breaker.trip();
        assert!(matches!(breaker.state(), CircuitState::Open { .. }));
        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_registry_returns_same_instance() {
        let registry = CircuitBreakerRegistry::new();
        let a = registry.breaker_with("db", test_config);
        let b = registry.breaker("db");
        assert!(Arc::ptr_eq(&a, &b));

        let _ = fail(&a).await;
        assert_eq!(registry.all_statistics()[0].total_failures, 1);

        registry.remove("db");
        assert!(registry.all_statistics().is_empty());
    }
}
