//! Error responses for tenant routes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use canopy_core::tenancy::TenancyError;
use serde_json::json;
use tracing::error;

/// A tenancy failure rendered as `{"error": <code>, "message": <text>}`.
#[derive(Debug)]
pub struct ApiError(pub TenancyError);

impl From<TenancyError> for ApiError {
    fn from(err: TenancyError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "Tenant request failed");
        }

        (
            status,
            Json(json!({
                "error": self.0.error_code(),
                "message": self.0.to_string(),
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_shared::types::TenantId;
    use rstest::rstest;

    #[rstest]
    #[case(TenancyError::NotFound(TenantId::new()), StatusCode::NOT_FOUND)]
    #[case(TenancyError::AccessDenied(TenantId::new()), StatusCode::FORBIDDEN)]
    #[case(
        TenancyError::CycleDetected { tenant_id: TenantId::new(), depth: 33 },
        StatusCode::INTERNAL_SERVER_ERROR
    )]
    fn test_status_follows_tenancy_error(#[case] err: TenancyError, #[case] status: StatusCode) {
        assert_eq!(ApiError(err).into_response().status(), status);
    }
}
