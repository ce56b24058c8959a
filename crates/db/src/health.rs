//! PostgreSQL health checks for the tenant model.

use async_trait::async_trait;
use canopy_core::tenancy::{
    CrudStatus, DatabaseCheck, HealthProbe, NewTenant, SessionContext, TenancyError,
    TenancyResult, TenantAdmin, TenantModelHealth, TenantPolicy, TenantStore,
};
use canopy_shared::types::TenantId;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};
use tracing::warn;

use crate::migration::REQUIRED_FUNCTIONS;
use crate::repositories::TenantRepository;
use crate::repositories::tenant::storage_error;
use crate::rls::RlsConnection;

/// Reads tenant model health from the database.
///
/// Give it the owner connection: the tenant count and the CRUD round trip
/// create a root tenant, which no session policy allows.
#[derive(Debug, Clone)]
pub struct PgHealthProbe {
    db: DatabaseConnection,
}

impl PgHealthProbe {
    /// Creates a health source over `db`.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn rls_enabled(&self) -> TenancyResult<bool> {
        let row = self
            .db
            .query_one(Statement::from_string(
                DbBackend::Postgres,
                "SELECT relrowsecurity FROM pg_class WHERE relname = 'tenants' AND relkind = 'r'",
            ))
            .await
            .map_err(storage_error)?;

        match row {
            Some(row) => row.try_get("", "relrowsecurity").map_err(storage_error),
            None => Ok(false),
        }
    }

    async fn functions_available(&self) -> TenancyResult<bool> {
        let names = REQUIRED_FUNCTIONS
            .iter()
            .map(|name| format!("'{name}'"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT COUNT(DISTINCT proname) AS found FROM pg_proc WHERE proname IN ({names})"
        );

        let row = self
            .db
            .query_one(Statement::from_string(DbBackend::Postgres, sql))
            .await
            .map_err(storage_error)?;

        let found: i64 = match row {
            Some(row) => row.try_get("", "found").map_err(storage_error)?,
            None => 0,
        };
        Ok(usize::try_from(found).unwrap_or_default() == REQUIRED_FUNCTIONS.len())
    }

    /// Create, read and delete a subsidiary through the policy layer and the
    /// SQL context functions, then roll everything back. On the owner
    /// connection the table policies do not filter these statements.
    async fn crud_round_trip(&self) -> CrudStatus {
        let rls = match RlsConnection::begin(&self.db).await {
            Ok(rls) => rls,
            Err(err) => {
                warn!(error = %err, "Could not begin health check transaction");
                return CrudStatus::Error;
            }
        };

        let outcome = exercise(&rls).await;
        if let Err(err) = rls.rollback().await {
            warn!(error = %err, "Health check rollback failed");
            return CrudStatus::Error;
        }

        match outcome {
            Ok(()) => CrudStatus::Working,
            Err(err) => {
                warn!(error = %err, "Tenant CRUD health check failed");
                CrudStatus::Error
            }
        }
    }
}

async fn exercise(rls: &RlsConnection) -> TenancyResult<()> {
    let store = rls.store();
    let root = TenantAdmin::new(&store)
        .create_root(&format!("health-check-{}", TenantId::new()), None)
        .await?;

    rls.set_context(root.tenant_id).await?;
    let policy = TenantPolicy::new(
        &store,
        SessionContext::from_raw(root.tenant_id.to_string()),
    );

    let child = policy
        .create(NewTenant::subsidiary("health-check-child", root.tenant_id))
        .await?;
    policy.get(child.tenant_id).await?;
    policy.delete(child.tenant_id).await
}

#[async_trait]
impl HealthProbe for PgHealthProbe {
    async fn tenant_model_health(&self) -> TenancyResult<TenantModelHealth> {
        let tenant_count = TenantRepository::new(&self.db).count().await?;

        let rls_enabled = self.rls_enabled().await.unwrap_or_else(|err| {
            warn!(error = %err, "Could not read RLS status");
            false
        });
        let rls_functions_available = self.functions_available().await.unwrap_or_else(|err| {
            warn!(error = %err, "Could not read RLS functions");
            false
        });

        Ok(TenantModelHealth {
            tenant_count,
            rls_enabled,
            rls_functions_available,
            crud_operations: self.crud_round_trip().await,
        })
    }

    async fn ping(&self) -> TenancyResult<()> {
        self.db.ping().await.map_err(storage_error)
    }

    async fn database_check(&self) -> TenancyResult<DatabaseCheck> {
        let row = self
            .db
            .query_one(Statement::from_string(
                DbBackend::Postgres,
                "SELECT 1 AS test_value, NOW() AS server_time",
            ))
            .await
            .map_err(storage_error)?
            .ok_or_else(|| TenancyError::Storage("Test query returned no row".to_string()))?;

        let test_value: i32 = row.try_get("", "test_value").map_err(storage_error)?;
        let server_time: DateTimeWithTimeZone =
            row.try_get("", "server_time").map_err(storage_error)?;
        Ok(DatabaseCheck {
            test_value,
            server_time: server_time.with_timezone(&Utc),
        })
    }
}
