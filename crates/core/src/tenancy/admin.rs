//! Administrative tenant operations.
//!
//! These operations run outside any session predicate (creating root
//! tenants, reorganizing the forest, seeding) but still enforce every data
//! invariant: valid names, type/parent consistency, existing parents,
//! acyclic reassignment, and no delete while children exist.

use canopy_shared::types::{PageRequest, PageResponse, TenantId};
use chrono::Utc;
use serde_json::Value;
use tracing::info;

use crate::tenancy::error::{TenancyError, TenancyResult};
use crate::tenancy::hierarchy::{DEFAULT_MAX_DEPTH, ensure_acyclic, hierarchy};
use crate::tenancy::store::TenantStore;
use crate::tenancy::types::{HierarchyNode, NewTenant, Tenant, TenantType};
use crate::tenancy::validation::{build_tenant, check_not_self_parent};

/// Administrative access to a tenant store.
#[derive(Debug, Clone)]
pub struct TenantAdmin<S> {
    store: S,
    max_depth: u32,
}

impl<S: TenantStore> TenantAdmin<S> {
    /// Wraps `store`.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets the depth bound used by traversal and reassignment checks.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns the wrapped store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a root tenant.
    pub async fn create_root(&self, name: &str, metadata: Option<Value>) -> TenancyResult<Tenant> {
        let mut input = NewTenant::root(name);
        input.metadata = metadata;
        self.create(input).await
    }

    /// Creates a tenant under any parent.
    pub async fn create(&self, input: NewTenant) -> TenancyResult<Tenant> {
        let tenant = self.store.create(build_tenant(input)?).await?;
        info!(
            tenant_id = %tenant.tenant_id,
            parent_id = ?tenant.parent_tenant_id,
            name = %tenant.name,
            "Tenant created"
        );
        Ok(tenant)
    }

    /// Fetches a tenant regardless of session.
    pub async fn get(&self, id: TenantId) -> TenancyResult<Tenant> {
        self.store.get(id).await?.ok_or(TenancyError::NotFound(id))
    }

    /// Lists tenants newest first, optionally filtered by type.
    pub async fn list(
        &self,
        page: PageRequest,
        tenant_type: Option<TenantType>,
    ) -> TenancyResult<PageResponse<Tenant>> {
        if !page.is_valid() {
            return Err(TenancyError::Validation(
                "Page must be >= 1 and page size between 1 and 1000".to_string(),
            ));
        }

        let all: Vec<Tenant> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|t| tenant_type.is_none_or(|ty| t.tenant_type == ty))
            .collect();

        Ok(PageResponse::from_items(all, page))
    }

    /// Deletes a childless tenant.
    pub async fn delete(&self, id: TenantId) -> TenancyResult<()> {
        let children = self.store.children_of(id).await?.len();
        if children > 0 {
            return Err(TenancyError::HasDependents {
                tenant_id: id,
                children,
            });
        }
        self.store.delete(id).await?;
        info!(tenant_id = %id, "Tenant deleted");
        Ok(())
    }

    /// Moves a tenant under `new_parent`, or makes it a root when `None`.
    pub async fn reassign_parent(
        &self,
        id: TenantId,
        new_parent: Option<TenantId>,
    ) -> TenancyResult<Tenant> {
        let current = self.get(id).await?;
        let moved = reparented(&self.store, current, new_parent, self.max_depth).await?;
        let saved = self.store.update(moved).await?;
        info!(tenant_id = %id, parent_id = ?new_parent, "Tenant reassigned");
        Ok(saved)
    }

    /// Lists `root_id` and all its descendants.
    pub async fn hierarchy(&self, root_id: TenantId) -> TenancyResult<Vec<HierarchyNode>> {
        hierarchy(&self.store, root_id, self.max_depth).await
    }
}

/// Builds the after-image of a parent reassignment, checking the new parent
/// exists and the forest stays acyclic.
async fn reparented<S>(
    store: &S,
    current: Tenant,
    new_parent: Option<TenantId>,
    max_depth: u32,
) -> TenancyResult<Tenant>
where
    S: TenantStore + ?Sized,
{
    check_not_self_parent(current.tenant_id, new_parent)?;
    if let Some(parent) = new_parent {
        if store.get(parent).await?.is_none() {
            return Err(TenancyError::UnknownTenant(parent));
        }
        ensure_acyclic(store, current.tenant_id, parent, max_depth).await?;
    }

    Ok(Tenant {
        parent_tenant_id: new_parent,
        tenant_type: TenantType::for_parent(new_parent),
        updated_at: Utc::now(),
        ..current
    })
}
