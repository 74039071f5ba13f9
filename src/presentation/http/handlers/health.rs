//! Health Check Handlers
//!
//! # Endpoints
//! - `GET /health/live` - Liveness probe (is the server running?)
//! - `GET /health/ready` - Readiness probe (can the server accept traffic?)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::time::Instant;

use crate::startup::AppState;

/// Server start time for uptime calculation
static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Initialize the server start time (call during startup)
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

/// Detailed health check response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub database: ServiceHealth,
    pub redis: ServiceHealth,
    pub gateway: GatewayHealth,
}

/// Health status for individual services
#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GatewayHealth {
    pub active_connections: usize,
    pub online_users: usize,
}

/// Overall health status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Simple liveness response
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

/// Liveness probe. Always 200 while the process serves requests.
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// Readiness probe. 503 when the conversation store is unreachable.
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let database = check_database(&state).await;
    let redis = check_redis(&state).await;
    let status = determine_overall_status(&database, &redis);

    let response = ReadinessResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: SERVER_START.elapsed().as_secs(),
        started_at: SERVER_START_TIME.to_rfc3339(),
        checks: HealthChecks {
            database,
            redis,
            gateway: GatewayHealth {
                active_connections: state.gateway.session_count(),
                online_users: state.gateway.online_user_count(),
            },
        },
    };

    let status_code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

async fn check_database(state: &AppState) -> ServiceHealth {
    let start = Instant::now();
    match state.conversations.ping().await {
        Ok(()) => {
            let latency = start.elapsed().as_millis() as u64;
            ServiceHealth {
                status: if latency < 100 {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded
                },
                latency_ms: Some(latency),
                message: None,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Readiness: store unreachable");
            ServiceHealth {
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                message: Some("Store unreachable".into()),
            }
        }
    }
}

async fn check_redis(state: &AppState) -> ServiceHealth {
    let Some(redis) = &state.redis else {
        return ServiceHealth {
            status: HealthStatus::Healthy,
            latency_ms: None,
            message: Some("Not configured".into()),
        };
    };

    let start = Instant::now();
    let mut conn = redis.clone();
    match redis::cmd("PING").query_async::<String>(&mut conn).await {
        Ok(_) => {
            let latency = start.elapsed().as_millis() as u64;
            ServiceHealth {
                status: if latency < 50 {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded
                },
                latency_ms: Some(latency),
                message: None,
            }
        }
        Err(e) => ServiceHealth {
            status: HealthStatus::Degraded,
            latency_ms: None,
            message: Some(format!("Redis connection failed: {}", e)),
        },
    }
}

/// The store is required; the profile cache only degrades.
fn determine_overall_status(db: &ServiceHealth, redis: &ServiceHealth) -> HealthStatus {
    if db.status == HealthStatus::Unhealthy {
        return HealthStatus::Unhealthy;
    }
    if db.status == HealthStatus::Degraded || redis.status != HealthStatus::Healthy {
        return HealthStatus::Degraded;
    }
    HealthStatus::Healthy
}
