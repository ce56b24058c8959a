//! In-memory tenant store.
//!
//! Used by tests, by the health check of engine-less deployments, and as the
//! reference behavior the PostgreSQL store must match. All invariant checks
//! and the mutation they guard run under one write lock.

use std::collections::HashMap;

use async_trait::async_trait;
use canopy_shared::types::TenantId;
use tokio::sync::RwLock;

use crate::tenancy::error::{TenancyError, TenancyResult};
use crate::tenancy::store::TenantStore;
use crate::tenancy::types::Tenant;

/// Tenant store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
}

impl InMemoryTenantStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row without any invariant check. Lets tests build the
    /// corrupted states the traversal guards against.
    #[cfg(test)]
    pub(crate) async fn insert_unchecked(&self, tenant: Tenant) {
        self.tenants.write().await.insert(tenant.tenant_id, tenant);
    }
}

fn sibling_name_taken(
    tenants: &HashMap<TenantId, Tenant>,
    candidate: &Tenant,
) -> bool {
    tenants.values().any(|t| {
        t.tenant_id != candidate.tenant_id
            && t.parent_tenant_id == candidate.parent_tenant_id
            && t.name == candidate.name
    })
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn create(&self, tenant: Tenant) -> TenancyResult<Tenant> {
        let mut tenants = self.tenants.write().await;

        if tenants.contains_key(&tenant.tenant_id) {
            return Err(TenancyError::Validation(format!(
                "Tenant {} already exists",
                tenant.tenant_id
            )));
        }
        if let Some(parent) = tenant.parent_tenant_id {
            if !tenants.contains_key(&parent) {
                return Err(TenancyError::UnknownTenant(parent));
            }
        }
        if sibling_name_taken(&tenants, &tenant) {
            return Err(TenancyError::duplicate_name(
                &tenant.name,
                tenant.parent_tenant_id,
            ));
        }

        tenants.insert(tenant.tenant_id, tenant.clone());
        Ok(tenant)
    }

    async fn get(&self, id: TenantId) -> TenancyResult<Option<Tenant>> {
        Ok(self.tenants.read().await.get(&id).cloned())
    }

    async fn children_of(&self, id: TenantId) -> TenancyResult<Vec<Tenant>> {
        let tenants = self.tenants.read().await;
        let mut children: Vec<Tenant> = tenants
            .values()
            .filter(|t| t.is_child_of(id))
            .cloned()
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    async fn list(&self) -> TenancyResult<Vec<Tenant>> {
        let tenants = self.tenants.read().await;
        let mut all: Vec<Tenant> = tenants.values().cloned().collect();
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.tenant_id.cmp(&a.tenant_id))
        });
        Ok(all)
    }

    async fn update(&self, tenant: Tenant) -> TenancyResult<Tenant> {
        let mut tenants = self.tenants.write().await;

        if !tenants.contains_key(&tenant.tenant_id) {
            return Err(TenancyError::NotFound(tenant.tenant_id));
        }
        if let Some(parent) = tenant.parent_tenant_id {
            if parent == tenant.tenant_id {
                return Err(TenancyError::Validation(
                    "A tenant cannot be its own parent".to_string(),
                ));
            }
            if !tenants.contains_key(&parent) {
                return Err(TenancyError::UnknownTenant(parent));
            }
        }
        if sibling_name_taken(&tenants, &tenant) {
            return Err(TenancyError::duplicate_name(
                &tenant.name,
                tenant.parent_tenant_id,
            ));
        }

        tenants.insert(tenant.tenant_id, tenant.clone());
        Ok(tenant)
    }

    async fn delete(&self, id: TenantId) -> TenancyResult<()> {
        let mut tenants = self.tenants.write().await;

        if !tenants.contains_key(&id) {
            return Err(TenancyError::NotFound(id));
        }
        let children = tenants.values().filter(|t| t.is_child_of(id)).count();
        if children > 0 {
            return Err(TenancyError::HasDependents {
                tenant_id: id,
                children,
            });
        }

        tenants.remove(&id);
        Ok(())
    }

    async fn count(&self) -> TenancyResult<u64> {
        Ok(self.tenants.read().await.len() as u64)
    }
}
