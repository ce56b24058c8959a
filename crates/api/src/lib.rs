//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - Tenant read routes scoped by the request's tenant header
//! - Liveness, readiness and tenant model health routes
//! - Tenant context middleware
//! - Shared application state

pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use canopy_core::tenancy::{HealthProbe, TenantDirectory};
use canopy_shared::TenancyConfig;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Health source for the tenant model (PostgreSQL or in-memory).
    pub probe: Arc<dyn HealthProbe>,
    /// Session-scoped tenant reads.
    pub tenants: Arc<dyn TenantDirectory>,
    /// Header name and traversal bound.
    pub tenancy: TenancyConfig,
    /// Process start, for liveness uptime.
    pub started: Instant,
}

impl AppState {
    /// Creates state with the default tenancy settings.
    pub fn new(
        probe: impl HealthProbe + 'static,
        tenants: impl TenantDirectory + 'static,
    ) -> Self {
        Self {
            probe: Arc::new(probe),
            tenants: Arc::new(tenants),
            tenancy: TenancyConfig::default(),
            started: Instant::now(),
        }
    }

    /// Replaces the tenancy settings.
    #[must_use]
    pub fn with_tenancy(mut self, tenancy: TenancyConfig) -> Self {
        self.tenancy = tenancy;
        self
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
