use std::{collections::BTreeMap, sync::Arc, time::Instant};

use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    clients::{circuit_breaker::CircuitBreaker, database::DatabaseClient, redis::RedisSeenCache},
    models::{
        circuit_breaker::CircuitState,
        health::{ComponentHealth, HealthCheckResponse, HealthStatus},
    },
};

pub struct HealthChecker {
    database: Arc<DatabaseClient>,
    cache: RedisSeenCache,
    circuit_breakers: Vec<Arc<CircuitBreaker>>,
}

impl HealthChecker {
    pub fn new(
        database: Arc<DatabaseClient>,
        cache: RedisSeenCache,
        circuit_breakers: Vec<Arc<CircuitBreaker>>,
    ) -> Self {
        Self {
            database,
            cache,
            circuit_breakers,
        }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = BTreeMap::new();

        checks.insert("database".to_string(), self.check_database().await);
        checks.insert("seen_cache".to_string(), self.check_cache().await);

        for breaker in &self.circuit_breakers {
            checks.insert(
                breaker.service_name().to_string(),
                check_circuit_breaker(breaker),
            );
        }

        HealthCheckResponse {
            status: overall_status(&checks),
            timestamp: Utc::now(),
            checks,
        }
    }

    async fn check_database(&self) -> ComponentHealth {
        let start = Instant::now();

        match self.database.health_check().await {
            Ok(()) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "Database health check passed");
                ComponentHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                ComponentHealth::unhealthy(e.to_string())
            }
        }
    }

    async fn check_cache(&self) -> ComponentHealth {
        let start = Instant::now();

        match self.cache.ping().await {
            Ok(()) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "Redis health check passed");
                ComponentHealth::healthy(elapsed)
            }
            // The cache is advisory; relaying continues without it.
            Err(e) => {
                warn!(error = %e, "Redis health check failed");
                ComponentHealth {
                    status: HealthStatus::Degraded,
                    ..ComponentHealth::unhealthy(e.to_string())
                }
            }
        }
    }
}

fn check_circuit_breaker(breaker: &CircuitBreaker) -> ComponentHealth {
    let state = breaker.state();
    debug!(
        service = breaker.service_name(),
        circuit_state = state.as_str(),
        "Circuit breaker state checked"
    );

    match state {
        CircuitState::Closed => ComponentHealth::circuit(HealthStatus::Healthy, state.as_str()),
        CircuitState::HalfOpen | CircuitState::Open => {
            ComponentHealth::circuit(HealthStatus::Degraded, state.as_str())
        }
    }
}

/// Unhealthy if any component is, degraded if any component is, else healthy.
pub fn overall_status(checks: &BTreeMap<String, ComponentHealth>) -> HealthStatus {
    if checks
        .values()
        .any(|health| health.status == HealthStatus::Unhealthy)
    {
        HealthStatus::Unhealthy
    } else if checks
        .values()
        .any(|health| health.status == HealthStatus::Degraded)
    {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}
