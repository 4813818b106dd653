use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::midtrans::MidtransClient;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

impl HealthResponse {
    pub fn status_code(&self) -> StatusCode {
        if self.status == "unhealthy" {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::OK
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn healthy(start: Instant) -> Self {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn unhealthy(error: impl ToString) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.to_string(),
        }
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

pub struct RedisChecker {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisChecker {
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl DependencyChecker for RedisChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        let mut conn = self.conn.clone();
        match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

/// Reports the Midtrans circuit breaker; an open circuit means checkouts are failing fast.
pub struct GatewayChecker {
    client: Arc<MidtransClient>,
}

impl GatewayChecker {
    pub fn new(client: Arc<MidtransClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DependencyChecker for GatewayChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.client.circuit_state().as_str() {
            "closed" => DependencyStatus::healthy(start),
            state => DependencyStatus::unhealthy(format!("circuit breaker {}", state)),
        }
    }
}

struct Dependency {
    name: String,
    critical: bool,
    checker: Box<dyn DependencyChecker>,
}

/// Runs every registered checker concurrently.
///
/// A failed critical dependency makes the service `unhealthy`; any other
/// failure only `degraded`.
pub struct HealthChecker {
    dependencies: Vec<Dependency>,
    start_time: Instant,
}

impl HealthChecker {
    pub fn new(start_time: Instant) -> Self {
        Self {
            dependencies: Vec::new(),
            start_time,
        }
    }

    pub fn with_dependency(
        mut self,
        name: impl Into<String>,
        critical: bool,
        checker: impl DependencyChecker + 'static,
    ) -> Self {
        self.dependencies.push(Dependency {
            name: name.into(),
            critical,
            checker: Box::new(checker),
        });
        self
    }

    pub async fn check(&self) -> HealthResponse {
        let results = futures::future::join_all(
            self.dependencies
                .iter()
                .map(|dep| timeout(CHECK_TIMEOUT, dep.checker.check())),
        )
        .await;

        let mut dependencies = HashMap::new();
        let mut critical_failure = false;
        let mut other_failure = false;

        for (dep, result) in self.dependencies.iter().zip(results) {
            let status = result.unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"));
            if matches!(status, DependencyStatus::Unhealthy { .. }) {
                if dep.critical {
                    critical_failure = true;
                } else {
                    other_failure = true;
                }
            }
            dependencies.insert(dep.name.clone(), status);
        }

        let status = if critical_failure {
            "unhealthy"
        } else if other_failure {
            "degraded"
        } else {
            "healthy"
        };

        HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            dependencies,
        }
    }
}
