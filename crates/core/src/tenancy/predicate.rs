//! The tenant access predicate.
//!
//! A session may access:
//! - rows of its own tenant
//! - rows of tenants whose direct parent is the session tenant
//!
//! Nothing else. Access is one level deep only: a grandparent does not see
//! its grandchildren, and siblings never see each other. The SQL function
//! `can_access_tenant` installed by the migrations implements the same rule
//! for the storage engine.

use canopy_shared::types::TenantId;
use tracing::debug;

use crate::tenancy::store::TenantStore;
use crate::tenancy::types::Tenant;

/// Decides whether `session` may access rows of `target`, whose parent is
/// `target_parent`.
#[must_use]
pub fn can_access(
    session: Option<TenantId>,
    target: TenantId,
    target_parent: Option<TenantId>,
) -> bool {
    let Some(session) = session else {
        return false;
    };
    if session == target {
        return true;
    }
    target_parent == Some(session)
}

/// Applies the predicate to a row image.
#[must_use]
pub fn can_access_row(session: Option<TenantId>, row: &Tenant) -> bool {
    can_access(session, row.tenant_id, row.parent_tenant_id)
}

/// Applies the predicate against the current state of `store`.
///
/// The target's parent link is read on every call. A missing target or any
/// store failure denies.
pub async fn can_access_in<S>(store: &S, session: Option<TenantId>, target: TenantId) -> bool
where
    S: TenantStore + ?Sized,
{
    let Some(session_id) = session else {
        return false;
    };
    if session_id == target {
        return true;
    }
    match store.get(target).await {
        Ok(Some(row)) => can_access_row(session, &row),
        Ok(None) => false,
        Err(err) => {
            debug!(tenant_id = %target, error = %err, "Parent lookup failed, denying access");
            false
        }
    }
}
