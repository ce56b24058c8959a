//! Tenant read routes.
//!
//! Every handler answers from the point of view of the tenant named in the
//! request header. Tenants outside that view are reported as not found.

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use canopy_core::tenancy::{HierarchyNode, SessionContext, TenancyError, Tenant};
use canopy_shared::types::pagination::MAX_PER_PAGE;
use canopy_shared::types::{PageRequest, PageResponse, TenantId};

use crate::AppState;
use crate::error::ApiError;

/// Creates the tenant routes (requires the tenant middleware).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tenants", get(list_tenants))
        .route("/tenants/{tenant_id}", get(get_tenant))
        .route("/tenants/{tenant_id}/hierarchy", get(get_hierarchy))
}

/// GET /tenants - Tenants visible to the acting tenant, one page at a time.
async fn list_tenants(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Query(page): Query<PageRequest>,
) -> Result<Json<PageResponse<Tenant>>, ApiError> {
    if !page.is_valid() {
        return Err(TenancyError::Validation(format!(
            "Page must be >= 1 and page size between 1 and {MAX_PER_PAGE}"
        ))
        .into());
    }

    let visible = state.tenants.visible(&ctx).await?;
    Ok(Json(PageResponse::from_items(visible, page)))
}

/// GET /tenants/{tenant_id} - One visible tenant.
async fn get_tenant(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(tenant_id): Path<TenantId>,
) -> Result<Json<Tenant>, ApiError> {
    Ok(Json(state.tenants.lookup(&ctx, tenant_id).await?))
}

/// GET /tenants/{tenant_id}/hierarchy - Visible subtree, bounded by the
/// configured traversal depth.
async fn get_hierarchy(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(tenant_id): Path<TenantId>,
) -> Result<Json<Vec<HierarchyNode>>, ApiError> {
    let nodes = state
        .tenants
        .subtree(&ctx, tenant_id, state.tenancy.max_hierarchy_depth)
        .await?;
    Ok(Json(nodes))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use canopy_core::tenancy::{InMemoryTenantStore, NewTenant, TenantAdmin};
    use canopy_shared::TenancyConfig;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::create_router;

    struct Banks {
        state: AppState,
        hsbc: Tenant,
        hk: Tenant,
        retail: Tenant,
    }

    async fn banks(tenancy: TenancyConfig) -> Banks {
        let store = Arc::new(InMemoryTenantStore::new());
        let admin = TenantAdmin::new(&*store);
        let hsbc = admin.create_root("HSBC", None).await.unwrap();
        let hk = admin
            .create(NewTenant::subsidiary("HSBC-HK", hsbc.tenant_id))
            .await
            .unwrap();
        let retail = admin
            .create(NewTenant::subsidiary("HSBC-HK Retail", hk.tenant_id))
            .await
            .unwrap();
        admin.create_root("Barclays", None).await.unwrap();

        let state = AppState::new(Arc::clone(&store), store).with_tenancy(tenancy);
        Banks {
            state,
            hsbc,
            hk,
            retail,
        }
    }

    async fn get_as(
        state: AppState,
        uri: &str,
        header: Option<(&str, String)>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().uri(uri);
        if let Some((name, value)) = header {
            request = request.header(name, value);
        }
        let response = create_router(state)
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn names(body: &Value) -> Vec<&str> {
        let mut names: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        names.sort_unstable();
        names
    }

    #[tokio::test]
    async fn test_list_is_scoped_by_tenant_header() {
        let b = banks(TenancyConfig::default()).await;

        let (status, body) = get_as(
            b.state.clone(),
            "/api/v1/tenants",
            Some(("X-Tenant-ID", b.hsbc.tenant_id.to_string())),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(names(&body), ["HSBC", "HSBC-HK"]);

        let (status, body) = get_as(b.state, "/api/v1/tenants", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(names(&body).is_empty());
        assert_eq!(body["meta"]["total"], 0);
    }

    #[tokio::test]
    async fn test_configured_header_name_is_used() {
        let tenancy = TenancyConfig {
            header_name: "X-Acting-Tenant".to_string(),
            ..TenancyConfig::default()
        };
        let b = banks(tenancy).await;
        let hk = b.hk.tenant_id.to_string();

        let (_, body) = get_as(
            b.state.clone(),
            "/api/v1/tenants",
            Some(("X-Acting-Tenant", hk.clone())),
        )
        .await;
        assert_eq!(names(&body), ["HSBC-HK", "HSBC-HK Retail"]);

        // The default header carries no weight once renamed
        let (_, body) = get_as(b.state, "/api/v1/tenants", Some(("X-Tenant-ID", hk))).await;
        assert!(names(&body).is_empty());
    }

    #[tokio::test]
    async fn test_list_pages_through_visible_tenants() {
        let b = banks(TenancyConfig::default()).await;
        let as_hsbc = Some(("X-Tenant-ID", b.hsbc.tenant_id.to_string()));

        let (status, body) = get_as(
            b.state.clone(),
            "/api/v1/tenants?page=2&per_page=1",
            as_hsbc.clone(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["meta"]["total"], 2);
        assert_eq!(body["meta"]["total_pages"], 2);

        let (status, body) = get_as(b.state, "/api/v1/tenants?per_page=0", as_hsbc).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_get_outside_view_is_not_found() {
        let b = banks(TenancyConfig::default()).await;
        let as_hk = Some(("X-Tenant-ID", b.hk.tenant_id.to_string()));

        let uri = format!("/api/v1/tenants/{}", b.retail.tenant_id);
        let (status, body) = get_as(b.state.clone(), &uri, as_hk.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "HSBC-HK Retail");

        let uri = format!("/api/v1/tenants/{}", b.hsbc.tenant_id);
        let (status, body) = get_as(b.state.clone(), &uri, as_hk).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "TENANT_NOT_FOUND");

        let (status, _) = get_as(b.state, &uri, Some(("X-Tenant-ID", "HSBC".to_string()))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_hierarchy_uses_configured_depth() {
        let b = banks(TenancyConfig::default()).await;
        let as_hk = Some(("X-Tenant-ID", b.hk.tenant_id.to_string()));
        let uri = format!("/api/v1/tenants/{}/hierarchy", b.hk.tenant_id);

        let (status, body) = get_as(b.state.clone(), &uri, as_hk.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[1]["path"], "HSBC-HK -> HSBC-HK Retail");
        assert_eq!(body[1]["depth"], 2);

        let shallow = b.state.with_tenancy(TenancyConfig {
            max_hierarchy_depth: 1,
            ..TenancyConfig::default()
        });
        let (status, body) = get_as(shallow, &uri, as_hk).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "CYCLE_DETECTED");
    }
}
