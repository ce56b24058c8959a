//! Tenant context middleware.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use canopy_core::tenancy::SessionContext;
use tracing::debug;

use crate::AppState;

/// Builds the session context from the configured tenant header.
///
/// The raw header value is adopted as is: a missing, malformed or unknown
/// tenant id never rejects the request, it only yields an empty view.
pub async fn tenant_context(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let raw = request
        .headers()
        .get(state.tenancy.header_name.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let ctx = match raw {
        Some(raw) => SessionContext::from_raw(raw),
        None => {
            debug!(header = %state.tenancy.header_name, "No tenant header on request");
            SessionContext::new()
        }
    };

    request.extensions_mut().insert(ctx);
    next.run(request).await
}
