//! API route definitions.

use axum::{Router, middleware};

use crate::{AppState, middleware::tenant::tenant_context};

pub mod health;
pub mod tenants;

/// Creates the API router with all routes.
///
/// Health routes stay outside the tenant middleware; tenant routes see the
/// session context built from the configured header.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    let tenant_routes = Router::new()
        .nest("/api/v1", tenants::routes())
        .layer(middleware::from_fn_with_state(state.clone(), tenant_context));

    Router::new().merge(health::routes()).merge(tenant_routes)
}
