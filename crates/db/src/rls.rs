//! Row-Level Security (RLS) context management.
//!
//! This module provides utilities for setting the `PostgreSQL` tenant context
//! per unit of work so the policies on `tenants` apply.
//!
//! # Usage
//!
//! ```ignore
//! use canopy_db::rls::RlsConnection;
//!
//! // In your handler or job:
//! let rls = RlsConnection::new(&db, tenant_id).await?;
//!
//! // Every query through rls.store() is filtered by the tenant predicate
//! let visible = rls.store().list().await?;
//!
//! // Commit when done
//! rls.commit().await?;
//! ```

use canopy_core::tenancy::{TenancyError, TenancyResult};
use canopy_shared::types::TenantId;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr, Statement,
    TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use crate::repositories::TenantRepository;
use crate::repositories::tenant::storage_error;

/// A database transaction carrying a tenant context.
///
/// The context is stored in `app.current_tenant_id` with transaction scope
/// (`set_config(..., true)`), so it disappears on commit or rollback and
/// never leaks to another request sharing the pooled connection.
pub struct RlsConnection {
    txn: DatabaseTransaction,
}

impl RlsConnection {
    /// Begins a transaction with no tenant context. Every policy denies
    /// until [`Self::set_context`] succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started.
    pub async fn begin(db: &DatabaseConnection) -> Result<Self, DbErr> {
        let txn = db.begin().await?;
        Ok(Self { txn })
    }

    /// Begins a transaction acting as `tenant_id`.
    ///
    /// # Errors
    ///
    /// - `UnknownTenant` if the tenant does not exist
    /// - `Storage` if the transaction cannot be started
    ///
    /// # Example
    ///
    /// ```ignore
    /// let rls = RlsConnection::new(&db, hsbc_id).await?;
    /// let children = rls.store().children_of(hsbc_id).await?;
    /// rls.commit().await?;
    /// ```
    pub async fn new(db: &DatabaseConnection, tenant_id: TenantId) -> TenancyResult<Self> {
        let rls = Self::begin(db).await.map_err(storage_error)?;
        rls.set_context(tenant_id).await?;
        Ok(rls)
    }

    /// Switches the acting tenant for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// `UnknownTenant` if the tenant does not exist; the previous context is
    /// kept.
    pub async fn set_context(&self, tenant_id: TenantId) -> TenancyResult<()> {
        set_rls_context(&self.txn, tenant_id).await
    }

    /// Clears the tenant context. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub async fn clear_context(&self) -> TenancyResult<()> {
        self.txn
            .execute_unprepared("SELECT clear_tenant_context()")
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    /// Reads the acting tenant back from the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn current_context(&self) -> TenancyResult<Option<TenantId>> {
        let row = self
            .txn
            .query_one(Statement::from_string(
                DbBackend::Postgres,
                "SELECT current_tenant_id() AS tenant_id",
            ))
            .await
            .map_err(storage_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let tenant: Option<Uuid> = row.try_get("", "tenant_id").map_err(storage_error)?;
        Ok(tenant.map(TenantId::from))
    }

    /// Returns a reference to the underlying transaction for executing queries.
    ///
    /// All queries executed through this transaction will be subject to
    /// the RLS policies for the current context.
    #[must_use]
    pub fn transaction(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Tenant store bound to this transaction.
    #[must_use]
    pub fn store(&self) -> TenantRepository<'_, DatabaseTransaction> {
        TenantRepository::new(&self.txn)
    }

    /// Commits the transaction, persisting all changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub async fn commit(self) -> Result<(), DbErr> {
        self.txn.commit().await
    }

    /// Rolls back the transaction, discarding all changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<(), DbErr> {
        self.txn.rollback().await
    }
}

/// Extension trait for `DatabaseConnection` to easily create RLS-enabled connections.
#[async_trait::async_trait]
pub trait RlsExt {
    /// Creates an RLS-enabled connection acting as `tenant_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the RLS connection cannot be created.
    async fn with_rls(&self, tenant_id: TenantId) -> TenancyResult<RlsConnection>;
}

#[async_trait::async_trait]
impl RlsExt for DatabaseConnection {
    async fn with_rls(&self, tenant_id: TenantId) -> TenancyResult<RlsConnection> {
        RlsConnection::new(self, tenant_id).await
    }
}

/// Sets the tenant context on an existing transaction.
///
/// Use this when you already have a transaction and need to set the RLS context.
/// The call runs inside a savepoint, so a rejected tenant leaves the
/// transaction usable with its previous context.
///
/// # Errors
///
/// `UnknownTenant` if the database reports the tenant does not exist.
pub async fn set_rls_context(txn: &DatabaseTransaction, tenant_id: TenantId) -> TenancyResult<()> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT set_tenant_context($1)",
        [Uuid::from(tenant_id).into()],
    );

    let savepoint = txn.begin().await.map_err(storage_error)?;
    match savepoint.execute(stmt).await {
        Ok(_) => {
            savepoint.commit().await.map_err(storage_error)?;
            debug!(tenant_id = %tenant_id, "RLS tenant context set");
            Ok(())
        }
        Err(err) => {
            savepoint.rollback().await.map_err(storage_error)?;
            if is_unknown_tenant(&err, tenant_id) {
                Err(TenancyError::UnknownTenant(tenant_id))
            } else {
                Err(storage_error(err))
            }
        }
    }
}

fn is_unknown_tenant(err: &DbErr, tenant_id: TenantId) -> bool {
    err.to_string()
        .contains(&format!("Tenant {tenant_id} does not exist"))
}
