//! Read-only tenant views for one request.
//!
//! `TenantDirectory` is what the HTTP layer talks to. Each call receives the
//! session context built from the request and answers only with rows that
//! session may see. Backends decide how: the in-memory store goes through
//! `TenantPolicy`, PostgreSQL opens a short RLS transaction per call.

use std::sync::Arc;

use async_trait::async_trait;
use canopy_shared::types::TenantId;

use crate::tenancy::context::SessionContext;
use crate::tenancy::error::TenancyResult;
use crate::tenancy::hierarchy::hierarchy;
use crate::tenancy::memory::InMemoryTenantStore;
use crate::tenancy::policy::TenantPolicy;
use crate::tenancy::predicate::can_access_in;
use crate::tenancy::types::{HierarchyNode, Tenant};

/// Session-scoped tenant reads.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Tenants visible to the session, newest first.
    async fn visible(&self, ctx: &SessionContext) -> TenancyResult<Vec<Tenant>>;

    /// One visible tenant; `NotFound` when absent or invisible.
    async fn lookup(&self, ctx: &SessionContext, id: TenantId) -> TenancyResult<Tenant>;

    /// The visible part of the subtree under `root_id`.
    ///
    /// The root itself must be visible. Nodes keep the depth and path they
    /// have in the full tree; invisible descendants are left out.
    async fn subtree(
        &self,
        ctx: &SessionContext,
        root_id: TenantId,
        max_depth: u32,
    ) -> TenancyResult<Vec<HierarchyNode>>;
}

#[async_trait]
impl<D> TenantDirectory for Arc<D>
where
    D: TenantDirectory + ?Sized,
{
    async fn visible(&self, ctx: &SessionContext) -> TenancyResult<Vec<Tenant>> {
        (**self).visible(ctx).await
    }

    async fn lookup(&self, ctx: &SessionContext, id: TenantId) -> TenancyResult<Tenant> {
        (**self).lookup(ctx, id).await
    }

    async fn subtree(
        &self,
        ctx: &SessionContext,
        root_id: TenantId,
        max_depth: u32,
    ) -> TenancyResult<Vec<HierarchyNode>> {
        (**self).subtree(ctx, root_id, max_depth).await
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantStore {
    async fn visible(&self, ctx: &SessionContext) -> TenancyResult<Vec<Tenant>> {
        TenantPolicy::new(self, ctx.clone()).list().await
    }

    async fn lookup(&self, ctx: &SessionContext, id: TenantId) -> TenancyResult<Tenant> {
        TenantPolicy::new(self, ctx.clone()).get(id).await
    }

    async fn subtree(
        &self,
        ctx: &SessionContext,
        root_id: TenantId,
        max_depth: u32,
    ) -> TenancyResult<Vec<HierarchyNode>> {
        TenantPolicy::new(self, ctx.clone()).get(root_id).await?;

        let session = ctx.current_context();
        let mut visible = Vec::new();
        for node in hierarchy(self, root_id, max_depth).await? {
            if can_access_in(self, session, node.tenant_id).await {
                visible.push(node);
            }
        }
        Ok(visible)
    }
}
