use std::{
    future::Future,
    sync::Mutex,
    time::{Duration, Instant},
};

use anyhow::{Error, Result, anyhow};
use tracing::{debug, info, warn};

use crate::models::circuit_breaker::{CircuitBreakerConfig, CircuitState};

struct BreakerState {
    state: CircuitState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Holds the single half-open trial slot until the trial call ends,
/// including when its future is dropped.
struct TrialSlot<'a> {
    breaker: &'a CircuitBreaker,
}

impl Drop for TrialSlot<'_> {
    fn drop(&mut self) {
        self.breaker.lock().trial_in_flight = false;
    }
}

/// In-process circuit breaker guarding one external service.
pub struct CircuitBreaker {
    service_name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(service_name: &str, config: CircuitBreakerConfig) -> Self {
        info!(service = %service_name, "Circuit breaker initialized");

        Self {
            service_name: service_name.to_string(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Current state, moving Open to HalfOpen once the timeout has elapsed.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    /// Runs `operation` unless the circuit is open. While half-open only one
    /// call at a time is let through as a trial; the others are rejected.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let _trial = self.admit()?;

        match operation().await {
            Ok(result) => {
                self.record_success();
                Ok(result)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }

    fn admit(&self) -> Result<Option<TrialSlot<'_>>, Error> {
        let mut inner = self.lock();
        self.refresh(&mut inner);

        match inner.state {
            CircuitState::Closed => Ok(None),
            CircuitState::Open => {
                warn!(service = %self.service_name, "Circuit breaker is open, rejecting request");
                Err(anyhow!("Circuit breaker is open for {}", self.service_name))
            }
            CircuitState::HalfOpen if inner.trial_in_flight => {
                debug!(service = %self.service_name, "Recovery trial in flight, rejecting request");
                Err(anyhow!(
                    "Circuit breaker is half-open for {} and already running a trial call",
                    self.service_name
                ))
            }
            CircuitState::HalfOpen => {
                debug!(service = %self.service_name, "Circuit breaker in half-open state, admitting trial call");
                inner.trial_in_flight = true;
                Ok(Some(TrialSlot { breaker: self }))
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn refresh(&self, inner: &mut BreakerState) {
        if inner.state != CircuitState::Open {
            return;
        }

        let timeout = Duration::from_secs(self.config.timeout_seconds);
        if inner.opened_at.is_some_and(|opened| opened.elapsed() >= timeout) {
            info!(service = %self.service_name, "Circuit breaker attempting reset");
            inner.state = CircuitState::HalfOpen;
            inner.successes = 0;
        }
    }

    fn record_success(&self) {
        let mut inner = self.lock();

        match inner.state {
            CircuitState::HalfOpen => {
                inner.successes += 1;
                debug!(
                    service = %self.service_name,
                    successes = inner.successes,
                    threshold = self.config.success_threshold,
                    "Circuit breaker success recorded"
                );

                if inner.successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.successes = 0;
                    inner.opened_at = None;
                    info!(service = %self.service_name, "Circuit breaker closed after successful recovery");
                }
            }
            CircuitState::Closed => inner.failures = 0,
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.lock();

        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            warn!(service = %self.service_name, "Circuit breaker reopened after failed recovery attempt");
            return;
        }

        inner.failures += 1;
        debug!(
            service = %self.service_name,
            failures = inner.failures,
            threshold = self.config.failure_threshold,
            "Circuit breaker failure recorded"
        );

        if inner.state == CircuitState::Closed && inner.failures >= self.config.failure_threshold {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            warn!(
                service = %self.service_name,
                failures = inner.failures,
                "Circuit breaker opened due to consecutive failures"
            );
        }
    }
}
