//! Health check endpoints.
//!
//! `/health/liveness` never touches the store. Everything else reports 503
//! when the store is unreachable, so load balancers can act on the code.

use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use canopy_core::tenancy::TenantModelHealth;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, warn};

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Time of the check.
    pub timestamp: DateTime<Utc>,
}

/// Tenant model health response.
#[derive(Serialize)]
pub struct TenantModelResponse {
    /// `healthy` only if RLS, the predicate functions and CRUD all check out.
    pub status: &'static str,
    /// Time of the check.
    pub timestamp: DateTime<Utc>,
    /// Always `tenant_model`.
    pub component: &'static str,
    /// Wall time spent collecting the details.
    pub response_time_ms: u64,
    /// Collected details, absent when collecting them failed.
    pub details: Option<TenantModelHealth>,
    /// Failure message when collection failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

const SERVICE_NAME: &str = "canopy";

/// Detailed health response.
#[derive(Serialize)]
pub struct DetailedHealthResponse {
    /// Overall status.
    pub status: &'static str,
    /// Time of the check.
    pub timestamp: DateTime<Utc>,
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Per-component status.
    pub components: Components,
}

/// Components covered by the detailed check.
#[derive(Serialize)]
pub struct Components {
    /// Backing store.
    pub database: ComponentStatus,
}

/// Status of one component.
#[derive(Serialize)]
pub struct ComponentStatus {
    /// `healthy` or `unhealthy`.
    pub status: &'static str,
    /// Time the component was checked.
    pub checked_at: DateTime<Utc>,
}

/// Database check response.
#[derive(Serialize)]
pub struct DatabaseHealthResponse {
    /// Overall status.
    pub status: &'static str,
    /// Time of the check.
    pub timestamp: DateTime<Utc>,
    /// Query outcome.
    pub database: DatabaseStatus,
}

/// Outcome of the test query.
#[derive(Serialize)]
pub struct DatabaseStatus {
    /// `healthy` or `unhealthy`.
    pub status: &'static str,
    /// `successful` when the query ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_query: Option<&'static str>,
    /// Value selected by the query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_value: Option<i32>,
    /// Store clock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_time: Option<DateTime<Utc>>,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Time the query finished.
    pub checked_at: DateTime<Utc>,
}

/// Readiness response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    /// `ready` when every required check passes.
    pub status: &'static str,
    /// Time of the check.
    pub timestamp: DateTime<Utc>,
    /// Individual checks.
    pub checks: Vec<ReadinessCheck>,
}

/// One readiness check.
#[derive(Serialize)]
pub struct ReadinessCheck {
    /// Check name.
    pub name: &'static str,
    /// `ready` or `not_ready`.
    pub status: &'static str,
    /// Whether overall readiness depends on it.
    pub required: bool,
}

/// Liveness response.
#[derive(Serialize)]
pub struct LivenessResponse {
    /// Always `alive`.
    pub status: &'static str,
    /// Time of the check.
    pub timestamp: DateTime<Utc>,
    /// Seconds since the state was built.
    pub uptime_seconds: u64,
}

const fn status_label(healthy: bool) -> (StatusCode, &'static str) {
    if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    }
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status) = status_label(store_reachable(&state).await);

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now(),
        }),
    )
}

async fn store_reachable(state: &AppState) -> bool {
    match state.probe.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Tenant store ping failed");
            false
        }
    }
}

/// Detailed health handler.
async fn detailed_health(
    State(state): State<AppState>,
) -> (StatusCode, Json<DetailedHealthResponse>) {
    let (code, status) = status_label(store_reachable(&state).await);

    (
        code,
        Json(DetailedHealthResponse {
            status,
            timestamp: Utc::now(),
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            components: Components {
                database: ComponentStatus {
                    status,
                    checked_at: Utc::now(),
                },
            },
        }),
    )
}

/// Database health handler: runs the test query.
async fn database_health(
    State(state): State<AppState>,
) -> (StatusCode, Json<DatabaseHealthResponse>) {
    let database = match state.probe.database_check().await {
        Ok(check) => DatabaseStatus {
            status: "healthy",
            test_query: Some("successful"),
            test_value: Some(check.test_value),
            server_time: Some(check.server_time),
            error: None,
            checked_at: Utc::now(),
        },
        Err(e) => {
            error!(error = %e, "Database health check failed");
            DatabaseStatus {
                status: "unhealthy",
                test_query: None,
                test_value: None,
                server_time: None,
                error: Some(e.to_string()),
                checked_at: Utc::now(),
            }
        }
    };
    let (code, status) = status_label(database.error.is_none());

    (
        code,
        Json(DatabaseHealthResponse {
            status,
            timestamp: Utc::now(),
            database,
        }),
    )
}

/// Readiness handler.
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let checks = vec![ReadinessCheck {
        name: "database",
        status: if store_reachable(&state).await {
            "ready"
        } else {
            "not_ready"
        },
        required: true,
    }];
    let ready = checks
        .iter()
        .filter(|check| check.required)
        .all(|check| check.status == "ready");

    let (code, status) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        code,
        Json(ReadinessResponse {
            status,
            timestamp: Utc::now(),
            checks,
        }),
    )
}

/// Liveness handler.
async fn liveness(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive",
        timestamp: Utc::now(),
        uptime_seconds: state.started.elapsed().as_secs(),
    })
}

/// Tenant model health handler.
async fn tenant_model_health(
    State(state): State<AppState>,
) -> (StatusCode, Json<TenantModelResponse>) {
    let started = Instant::now();
    let outcome = state.probe.tenant_model_health().await;
    let response_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let (details, error) = match outcome {
        Ok(details) => (Some(details), None),
        Err(e) => {
            error!(error = %e, "Tenant model health check failed");
            (None, Some(e.to_string()))
        }
    };
    let (code, status) = status_label(details.as_ref().is_some_and(TenantModelHealth::is_healthy));

    (
        code,
        Json(TenantModelResponse {
            status,
            timestamp: Utc::now(),
            component: "tenant_model",
            response_time_ms,
            details,
            error,
        }),
    )
}

/// Creates health check routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(detailed_health))
        .route("/health/database", get(database_health))
        .route("/health/readiness", get(readiness))
        .route("/health/liveness", get(liveness))
        .route("/health/tenant-model", get(tenant_model_health))
}
