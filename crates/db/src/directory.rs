//! PostgreSQL tenant directory for request handlers.
//!
//! Every call opens its own transaction on the application role connection,
//! sets the session's tenant context and lets the table policies do the
//! filtering. The transaction is always rolled back: nothing here writes.

use async_trait::async_trait;
use canopy_core::tenancy::{
    HierarchyNode, SessionContext, TenancyError, TenancyResult, Tenant, TenantDirectory,
    TenantStore,
};
use canopy_shared::types::TenantId;
use sea_orm::DatabaseConnection;
use tracing::{debug, warn};

use crate::repositories::tenant::storage_error;
use crate::rls::RlsConnection;

/// Session-scoped reads backed by row-level security.
///
/// Give it the application role connection (`APP_DATABASE_URL`). On the
/// owner connection the policies do not apply and every tenant is visible.
#[derive(Debug, Clone)]
pub struct PgTenantDirectory {
    db: DatabaseConnection,
}

impl PgTenantDirectory {
    /// Creates a directory over `db`.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Begins a transaction carrying the session's context.
    ///
    /// A context naming a tenant that does not exist leaves the transaction
    /// without context, so every policy denies.
    async fn begin(&self, ctx: &SessionContext) -> TenancyResult<RlsConnection> {
        let rls = RlsConnection::begin(&self.db).await.map_err(storage_error)?;
        if let Some(tenant_id) = ctx.current_context() {
            match rls.set_context(tenant_id).await {
                Ok(()) => {}
                Err(TenancyError::UnknownTenant(_)) => {
                    debug!(tenant_id = %tenant_id, "Unknown tenant in request, denying all rows");
                }
                Err(err) => {
                    rollback(rls).await;
                    return Err(err);
                }
            }
        }
        Ok(rls)
    }
}

async fn rollback(rls: RlsConnection) {
    if let Err(err) = rls.rollback().await {
        warn!(error = %err, "Directory rollback failed");
    }
}

async fn read_only<T>(rls: RlsConnection, result: TenancyResult<T>) -> TenancyResult<T> {
    rollback(rls).await;
    result
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn visible(&self, ctx: &SessionContext) -> TenancyResult<Vec<Tenant>> {
        let rls = self.begin(ctx).await?;
        let result = rls.store().list().await;
        read_only(rls, result).await
    }

    async fn lookup(&self, ctx: &SessionContext, id: TenantId) -> TenancyResult<Tenant> {
        let rls = self.begin(ctx).await?;
        let result = rls
            .store()
            .get(id)
            .await
            .and_then(|tenant| tenant.ok_or(TenancyError::NotFound(id)));
        read_only(rls, result).await
    }

    async fn subtree(
        &self,
        ctx: &SessionContext,
        root_id: TenantId,
        max_depth: u32,
    ) -> TenancyResult<Vec<HierarchyNode>> {
        let rls = self.begin(ctx).await?;
        let store = rls.store();
        let result = match store.get(root_id).await {
            Ok(Some(_)) => store.hierarchy(root_id, max_depth).await,
            Ok(None) => Err(TenancyError::NotFound(root_id)),
            Err(err) => Err(err),
        };
        read_only(rls, result).await
    }
}
