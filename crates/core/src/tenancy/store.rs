//! Tenant storage abstraction.
//!
//! A `TenantStore` persists the tenant forest and enforces its data
//! invariants (existing parent, unique sibling names, no delete while
//! children exist). It does not know about sessions; access control is
//! layered on top by `TenantPolicy`.

use std::sync::Arc;

use async_trait::async_trait;
use canopy_shared::types::TenantId;

use crate::tenancy::error::TenancyResult;
use crate::tenancy::types::Tenant;

/// Persistence for tenant records.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Inserts a fully formed tenant.
    ///
    /// Fails with `UnknownTenant` if the parent does not exist and with
    /// `DuplicateName` if a sibling already has the name.
    async fn create(&self, tenant: Tenant) -> TenancyResult<Tenant>;

    /// Fetches a tenant by id.
    async fn get(&self, id: TenantId) -> TenancyResult<Option<Tenant>>;

    /// Direct children of `id`, ordered by name.
    async fn children_of(&self, id: TenantId) -> TenancyResult<Vec<Tenant>>;

    /// All tenants, newest first.
    async fn list(&self) -> TenancyResult<Vec<Tenant>>;

    /// Replaces the stored row with `tenant`.
    ///
    /// Fails with `NotFound` if the row does not exist.
    async fn update(&self, tenant: Tenant) -> TenancyResult<Tenant>;

    /// Deletes a tenant that has no children.
    ///
    /// Fails with `HasDependents` if any row references the target as
    /// parent. Never cascades.
    async fn delete(&self, id: TenantId) -> TenancyResult<()>;

    /// Number of stored tenants.
    async fn count(&self) -> TenancyResult<u64>;
}

#[async_trait]
impl<S> TenantStore for Arc<S>
where
    S: TenantStore + ?Sized,
{
    async fn create(&self, tenant: Tenant) -> TenancyResult<Tenant> {
        (**self).create(tenant).await
    }

    async fn get(&self, id: TenantId) -> TenancyResult<Option<Tenant>> {
        (**self).get(id).await
    }

    async fn children_of(&self, id: TenantId) -> TenancyResult<Vec<Tenant>> {
        (**self).children_of(id).await
    }

    async fn list(&self) -> TenancyResult<Vec<Tenant>> {
        (**self).list().await
    }

    async fn update(&self, tenant: Tenant) -> TenancyResult<Tenant> {
        (**self).update(tenant).await
    }

    async fn delete(&self, id: TenantId) -> TenancyResult<()> {
        (**self).delete(id).await
    }

    async fn count(&self) -> TenancyResult<u64> {
        (**self).count().await
    }
}

#[async_trait]
impl<'a, S> TenantStore for &'a S
where
    S: TenantStore + ?Sized,
{
    async fn create(&self, tenant: Tenant) -> TenancyResult<Tenant> {
        (**self).create(tenant).await
    }

    async fn get(&self, id: TenantId) -> TenancyResult<Option<Tenant>> {
        (**self).get(id).await
    }

    async fn children_of(&self, id: TenantId) -> TenancyResult<Vec<Tenant>> {
        (**self).children_of(id).await
    }

    async fn list(&self) -> TenancyResult<Vec<Tenant>> {
        (**self).list().await
    }

    async fn update(&self, tenant: Tenant) -> TenancyResult<Tenant> {
        (**self).update(tenant).await
    }

    async fn delete(&self, id: TenantId) -> TenancyResult<()> {
        (**self).delete(id).await
    }

    async fn count(&self) -> TenancyResult<u64> {
        (**self).count().await
    }
}
