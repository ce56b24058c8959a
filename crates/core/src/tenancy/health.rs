//! Health summary of the tenant model.

use std::sync::Arc;

use async_trait::async_trait;
use canopy_shared::types::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tenancy::admin::TenantAdmin;
use crate::tenancy::context::SessionContext;
use crate::tenancy::error::{TenancyError, TenancyResult};
use crate::tenancy::memory::InMemoryTenantStore;
use crate::tenancy::policy::TenantPolicy;
use crate::tenancy::store::TenantStore;
use crate::tenancy::types::NewTenant;

/// Outcome of the CRUD round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrudStatus {
    /// Create, read and delete all succeeded.
    Working,
    /// Some step failed.
    Error,
}

/// Health details reported by `GET /health/tenant-model`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantModelHealth {
    /// Number of stored tenants.
    pub tenant_count: u64,
    /// Whether row-level security is enabled on the tenants table.
    pub rls_enabled: bool,
    /// Whether all predicate functions are installed.
    pub rls_functions_available: bool,
    /// Result of the CRUD round trip.
    pub crud_operations: CrudStatus,
}

impl TenantModelHealth {
    /// True when every check passed.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.rls_enabled
            && self.rls_functions_available
            && self.crud_operations == CrudStatus::Working
    }
}

/// Result of a trivial query against the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseCheck {
    /// Constant selected by the test query.
    pub test_value: i32,
    /// Clock of the store at query time.
    pub server_time: DateTime<Utc>,
}

/// Source of tenant model health information.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Collects the tenant model summary.
    async fn tenant_model_health(&self) -> TenancyResult<TenantModelHealth>;

    /// Cheap liveness check of the backing store.
    async fn ping(&self) -> TenancyResult<()>;

    /// Runs `SELECT 1` with the store's clock. Stores without a query
    /// engine answer with a ping and the local clock.
    async fn database_check(&self) -> TenancyResult<DatabaseCheck> {
        self.ping().await?;
        Ok(DatabaseCheck {
            test_value: 1,
            server_time: Utc::now(),
        })
    }
}

/// Runs a create/read/delete cycle through the policy layer and reports
/// whether it worked. Leaves no rows behind on success.
pub async fn crud_round_trip<S>(store: &S) -> CrudStatus
where
    S: TenantStore + ?Sized,
{
    match try_round_trip(store).await {
        Ok(()) => CrudStatus::Working,
        Err(err) => {
            warn!(error = %err, "Tenant CRUD health check failed");
            CrudStatus::Error
        }
    }
}

async fn try_round_trip<S>(store: &S) -> TenancyResult<()>
where
    S: TenantStore + ?Sized,
{
    let admin = TenantAdmin::new(store);
    let root = admin
        .create_root(&format!("health-check-{}", TenantId::new()), None)
        .await?;

    let exercised = exercise_policy(store, root.tenant_id).await;
    let cleaned = admin.delete(root.tenant_id).await;
    exercised.and(cleaned)
}

async fn exercise_policy<S>(store: &S, root: TenantId) -> TenancyResult<()>
where
    S: TenantStore + ?Sized,
{
    let mut policy = TenantPolicy::new(store, SessionContext::new());
    policy.set_context(root).await?;

    let child = policy
        .create(NewTenant::subsidiary("health-check-child", root))
        .await?;
    let fetched = policy.get(child.tenant_id).await?;
    if fetched.name != child.name {
        return Err(TenancyError::Storage(
            "Round trip read back a different tenant".to_string(),
        ));
    }
    policy.delete(child.tenant_id).await
}

#[async_trait]
impl<P> HealthProbe for Arc<P>
where
    P: HealthProbe + ?Sized,
{
    async fn tenant_model_health(&self) -> TenancyResult<TenantModelHealth> {
        (**self).tenant_model_health().await
    }

    async fn ping(&self) -> TenancyResult<()> {
        (**self).ping().await
    }

    async fn database_check(&self) -> TenancyResult<DatabaseCheck> {
        (**self).database_check().await
    }
}

#[async_trait]
impl HealthProbe for InMemoryTenantStore {
    async fn tenant_model_health(&self) -> TenancyResult<TenantModelHealth> {
        let tenant_count = self.count().await?;
        Ok(TenantModelHealth {
            tenant_count,
            // The policy layer is the enforcement here and is always on.
            rls_enabled: true,
            rls_functions_available: true,
            crud_operations: crud_round_trip(self).await,
        })
    }

    async fn ping(&self) -> TenancyResult<()> {
        self.count().await.map(|_| ())
    }
}
