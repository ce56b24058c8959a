//! PostgreSQL tenant store.
//!
//! `TenantRepository` runs over any `SeaORM` connection. Over the owner
//! connection it is the administrative store; over an
//! [`RlsConnection`](crate::rls::RlsConnection) transaction every statement is
//! additionally filtered by the policies on `tenants`, so rows outside the
//! session scope are simply absent.

use async_trait::async_trait;
use canopy_core::tenancy::{
    HierarchyNode, TenancyError, TenancyResult, Tenant, TenantStore, TenantType,
};
use canopy_shared::types::TenantId;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, DbBackend, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr, Statement,
};
use tracing::warn;
use uuid::Uuid;

use crate::entities::tenants;

/// Tenant repository bound to one connection or transaction.
#[derive(Debug, Clone, Copy)]
pub struct TenantRepository<'c, C> {
    conn: &'c C,
}

impl<'c, C> TenantRepository<'c, C>
where
    C: ConnectionTrait + Send + Sync,
{
    /// Creates a new tenant repository.
    #[must_use]
    pub const fn new(conn: &'c C) -> Self {
        Self { conn }
    }

    /// Runs `get_tenant_hierarchy` in the database.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the root is absent or invisible
    /// - `CycleDetected` if the database reports a cycle or depth overrun
    pub async fn hierarchy(
        &self,
        root_id: TenantId,
        max_depth: u32,
    ) -> TenancyResult<Vec<HierarchyNode>> {
        let depth = i32::try_from(max_depth).unwrap_or(i32::MAX);
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r"SELECT tenant_id, name, tenant_type::text AS tenant_type, level, path
              FROM get_tenant_hierarchy($1, $2)",
            [Uuid::from(root_id).into(), depth.into()],
        );

        let rows = match self.conn.query_all(stmt).await {
            Ok(rows) => rows,
            Err(err) if err.to_string().contains("cycle detected") => {
                warn!(root_id = %root_id, error = %err, "Tenant hierarchy is not a forest");
                return Err(TenancyError::CycleDetected {
                    tenant_id: root_id,
                    depth: max_depth.saturating_add(1),
                });
            }
            Err(err) => return Err(storage_error(err)),
        };
        if rows.is_empty() {
            return Err(TenancyError::NotFound(root_id));
        }

        rows.into_iter()
            .map(|row| {
                let tenant_id: Uuid = row.try_get("", "tenant_id").map_err(storage_error)?;
                let name: String = row.try_get("", "name").map_err(storage_error)?;
                let tenant_type: String = row.try_get("", "tenant_type").map_err(storage_error)?;
                let level: i32 = row.try_get("", "level").map_err(storage_error)?;
                let path: String = row.try_get("", "path").map_err(storage_error)?;
                Ok(HierarchyNode {
                    tenant_id: TenantId::from(tenant_id),
                    name,
                    tenant_type: TenantType::parse(&tenant_type).ok_or_else(|| {
                        TenancyError::Storage(format!("Unknown tenant type '{tenant_type}'"))
                    })?,
                    depth: u32::try_from(level).unwrap_or_default(),
                    path,
                })
            })
            .collect()
    }

    async fn child_count(&self, id: TenantId) -> TenancyResult<usize> {
        let count = tenants::Entity::find()
            .filter(tenants::Column::ParentTenantId.eq(Uuid::from(id)))
            .count(self.conn)
            .await
            .map_err(storage_error)?;
        Ok(usize::try_from(count).unwrap_or(usize::MAX))
    }

    async fn has_children(&self, id: TenantId) -> TenancyResult<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT tenant_has_children($1) AS has_children",
            [Uuid::from(id).into()],
        );
        let row = self.conn.query_one(stmt).await.map_err(storage_error)?;
        match row {
            Some(row) => row.try_get("", "has_children").map_err(storage_error),
            None => Ok(false),
        }
    }

    /// A delete touched no row: either the row is invisible or absent, or
    /// the delete policy held it back because it still has children.
    async fn explain_missed_delete(&self, id: TenantId) -> TenancyResult<()> {
        if self.get(id).await?.is_some() && self.has_children(id).await? {
            let children = self.child_count(id).await?.max(1);
            return Err(TenancyError::HasDependents {
                tenant_id: id,
                children,
            });
        }
        Err(TenancyError::NotFound(id))
    }
}

#[async_trait]
impl<'c, C> TenantStore for TenantRepository<'c, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn create(&self, tenant: Tenant) -> TenancyResult<Tenant> {
        let model = tenants::ActiveModel {
            tenant_id: Set(tenant.tenant_id.into()),
            name: Set(tenant.name.clone()),
            tenant_type: Set(tenant.tenant_type.into()),
            parent_tenant_id: Set(tenant.parent_tenant_id.map(Uuid::from)),
            metadata: Set(tenant.metadata.clone()),
            created_at: Set(tenant.created_at.into()),
            updated_at: Set(tenant.updated_at.into()),
        };

        model
            .insert(self.conn)
            .await
            .map(Tenant::from)
            .map_err(|err| map_write_error(err, &tenant))
    }

    async fn get(&self, id: TenantId) -> TenancyResult<Option<Tenant>> {
        tenants::Entity::find_by_id(Uuid::from(id))
            .one(self.conn)
            .await
            .map(|model| model.map(Tenant::from))
            .map_err(storage_error)
    }

    async fn children_of(&self, id: TenantId) -> TenancyResult<Vec<Tenant>> {
        let models = tenants::Entity::find()
            .filter(tenants::Column::ParentTenantId.eq(Uuid::from(id)))
            .order_by_asc(tenants::Column::Name)
            .all(self.conn)
            .await
            .map_err(storage_error)?;
        Ok(models.into_iter().map(Tenant::from).collect())
    }

    async fn list(&self) -> TenancyResult<Vec<Tenant>> {
        let models = tenants::Entity::find()
            .order_by_desc(tenants::Column::CreatedAt)
            .order_by_desc(tenants::Column::TenantId)
            .all(self.conn)
            .await
            .map_err(storage_error)?;
        Ok(models.into_iter().map(Tenant::from).collect())
    }

    async fn update(&self, tenant: Tenant) -> TenancyResult<Tenant> {
        let model = tenants::ActiveModel {
            tenant_id: ActiveValue::Unchanged(tenant.tenant_id.into()),
            name: Set(tenant.name.clone()),
            tenant_type: Set(tenant.tenant_type.into()),
            parent_tenant_id: Set(tenant.parent_tenant_id.map(Uuid::from)),
            metadata: Set(tenant.metadata.clone()),
            updated_at: Set(tenant.updated_at.into()),
            ..Default::default()
        };

        match model.update(self.conn).await {
            Ok(model) => Ok(Tenant::from(model)),
            Err(DbErr::RecordNotUpdated) => Err(TenancyError::NotFound(tenant.tenant_id)),
            Err(err) => Err(map_write_error(err, &tenant)),
        }
    }

    async fn delete(&self, id: TenantId) -> TenancyResult<()> {
        let result = tenants::Entity::delete_by_id(Uuid::from(id))
            .exec(self.conn)
            .await;

        match result {
            Ok(res) if res.rows_affected > 0 => Ok(()),
            Ok(_) => self.explain_missed_delete(id).await,
            Err(err) if matches!(err.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_))) => {
                Err(TenancyError::HasDependents {
                    tenant_id: id,
                    children: self.child_count(id).await.unwrap_or(1).max(1),
                })
            }
            Err(err) => Err(storage_error(err)),
        }
    }

    async fn count(&self) -> TenancyResult<u64> {
        tenants::Entity::find()
            .count(self.conn)
            .await
            .map_err(storage_error)
    }
}

/// Wraps a backend failure.
pub(crate) fn storage_error(err: DbErr) -> TenancyError {
    TenancyError::Storage(err.to_string())
}

/// Translates constraint and policy violations raised by an insert or
/// update of `tenant`.
fn map_write_error(err: DbErr, tenant: &Tenant) -> TenancyError {
    let message = err.to_string();
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            TenancyError::duplicate_name(&tenant.name, tenant.parent_tenant_id)
        }
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => match tenant.parent_tenant_id {
            Some(parent) => TenancyError::UnknownTenant(parent),
            None => TenancyError::Storage(message),
        },
        _ if message.contains("can only be changed administratively") => {
            warn!(tenant_id = %tenant.tenant_id, "Parent link change rejected for tenant session");
            TenancyError::AccessDenied(tenant.tenant_id)
        }
        _ if message.contains("row-level security") => {
            warn!(tenant_id = %tenant.tenant_id, "Tenant write rejected by RLS policy");
            TenancyError::AccessDenied(tenant.tenant_id)
        }
        _ if message.contains("ck_tenant_") => TenancyError::Validation(message),
        _ => TenancyError::Storage(message),
    }
}
