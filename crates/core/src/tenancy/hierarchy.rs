//! Hierarchy traversal.
//!
//! Unlike the access predicate, traversal is fully transitive: it is an
//! inspection tool, not an access gate. The forest invariant makes it
//! finite, but a corrupted store could still contain a cycle, so every walk
//! keeps a visited set and a depth bound and fails with `CycleDetected`
//! instead of looping.

use std::collections::HashSet;

use canopy_shared::types::TenantId;
use tracing::warn;

use crate::tenancy::error::{TenancyError, TenancyResult};
use crate::tenancy::store::TenantStore;
use crate::tenancy::types::{HierarchyNode, Tenant};

/// Depth bound used when none is configured.
pub const DEFAULT_MAX_DEPTH: u32 = 32;

/// Separator between names in `HierarchyNode::path`.
pub const PATH_SEPARATOR: &str = " -> ";

/// Lists `root_id` and all of its descendants.
///
/// Rows are ordered by `(depth, name)`; the root is the single row at
/// depth 1.
///
/// # Errors
///
/// - `NotFound` if `root_id` does not exist
/// - `CycleDetected` if a tenant is reached twice or the traversal goes
///   deeper than `max_depth`
pub async fn hierarchy<S>(
    store: &S,
    root_id: TenantId,
    max_depth: u32,
) -> TenancyResult<Vec<HierarchyNode>>
where
    S: TenantStore + ?Sized,
{
    let root = store
        .get(root_id)
        .await?
        .ok_or(TenancyError::NotFound(root_id))?;

    let mut visited = HashSet::from([root.tenant_id]);
    let mut nodes = vec![node(&root, 1, root.name.clone())];
    let mut frontier: Vec<(TenantId, String)> = vec![(root.tenant_id, root.name)];
    let mut depth: u32 = 1;

    while !frontier.is_empty() {
        let next_depth = depth + 1;
        let mut next = Vec::new();

        for (parent_id, parent_path) in &frontier {
            for child in store.children_of(*parent_id).await? {
                if !visited.insert(child.tenant_id) || next_depth > max_depth {
                    warn!(
                        root_id = %root_id,
                        tenant_id = %child.tenant_id,
                        depth = next_depth,
                        "Tenant hierarchy is not a forest"
                    );
                    return Err(TenancyError::CycleDetected {
                        tenant_id: child.tenant_id,
                        depth: next_depth,
                    });
                }
                let path = format!("{parent_path}{PATH_SEPARATOR}{}", child.name);
                nodes.push(node(&child, next_depth, path.clone()));
                next.push((child.tenant_id, path));
            }
        }

        frontier = next;
        depth = next_depth;
    }

    nodes.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.name.cmp(&b.name)));
    Ok(nodes)
}

/// Checks that making `new_parent` the parent of `tenant_id` keeps the
/// forest acyclic, by walking up from `new_parent`.
///
/// # Errors
///
/// - `UnknownTenant` if an ancestor link points at a missing tenant
/// - `CycleDetected` if the walk reaches `tenant_id`, revisits a tenant, or
///   exceeds `max_depth`
pub async fn ensure_acyclic<S>(
    store: &S,
    tenant_id: TenantId,
    new_parent: TenantId,
    max_depth: u32,
) -> TenancyResult<()>
where
    S: TenantStore + ?Sized,
{
    let mut seen = HashSet::new();
    let mut cursor = Some(new_parent);
    let mut depth: u32 = 0;

    while let Some(current) = cursor {
        depth += 1;
        if current == tenant_id || !seen.insert(current) || depth > max_depth {
            return Err(TenancyError::CycleDetected {
                tenant_id: current,
                depth,
            });
        }
        let row = store
            .get(current)
            .await?
            .ok_or(TenancyError::UnknownTenant(current))?;
        cursor = row.parent_tenant_id;
    }
    Ok(())
}

fn node(tenant: &Tenant, depth: u32, path: String) -> HierarchyNode {
    HierarchyNode {
        tenant_id: tenant.tenant_id,
        name: tenant.name.clone(),
        tenant_type: tenant.tenant_type,
        depth,
        path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenancy::admin::TenantAdmin;
    use crate::tenancy::memory::InMemoryTenantStore;
    use crate::tenancy::types::NewTenant;
    use crate::tenancy::validation::build_tenant;

    #[tokio::test]
    async fn test_single_root() {
        let store = InMemoryTenantStore::new();
        let admin = TenantAdmin::new(&store);
        let root = admin.create_root("Barclays", None).await.unwrap();

        let rows = hierarchy(&store, root.tenant_id, DEFAULT_MAX_DEPTH)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].depth, 1);
        assert_eq!(rows[0].path, "Barclays");
    }

    #[tokio::test]
    async fn test_three_levels_ordered_by_depth_then_name() {
        let store = InMemoryTenantStore::new();
        let admin = TenantAdmin::new(&store);
        let hsbc = admin.create_root("HSBC", None).await.unwrap();
        let uk = admin
            .create(NewTenant::subsidiary("HSBC-UK", hsbc.tenant_id))
            .await
            .unwrap();
        let hk = admin
            .create(NewTenant::subsidiary("HSBC-HK", hsbc.tenant_id))
            .await
            .unwrap();
        admin
            .create(NewTenant::subsidiary("HSBC-HK Retail", hk.tenant_id))
            .await
            .unwrap();
        admin
            .create(NewTenant::subsidiary("HSBC-UK Alpha", uk.tenant_id))
            .await
            .unwrap();

        let rows = hierarchy(&store, hsbc.tenant_id, DEFAULT_MAX_DEPTH)
            .await
            .unwrap();
        let summary: Vec<(u32, &str)> = rows.iter().map(|r| (r.depth, r.path.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (1, "HSBC"),
                (2, "HSBC -> HSBC-HK"),
                (2, "HSBC -> HSBC-UK"),
                (3, "HSBC -> HSBC-HK -> HSBC-HK Retail"),
                (3, "HSBC -> HSBC-UK -> HSBC-UK Alpha"),
            ]
        );
    }

    #[tokio::test]
    async fn test_subtree_root() {
        let store = InMemoryTenantStore::new();
        let admin = TenantAdmin::new(&store);
        let hsbc = admin.create_root("HSBC", None).await.unwrap();
        let hk = admin
            .create(NewTenant::subsidiary("HSBC-HK", hsbc.tenant_id))
            .await
            .unwrap();

        let rows = hierarchy(&store, hk.tenant_id, DEFAULT_MAX_DEPTH)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tenant_id, hk.tenant_id);
        assert_eq!(rows[0].depth, 1);
    }

    #[tokio::test]
    async fn test_unknown_root() {
        let store = InMemoryTenantStore::new();
        let id = TenantId::new();
        assert_eq!(
            hierarchy(&store, id, DEFAULT_MAX_DEPTH).await.unwrap_err(),
            TenancyError::NotFound(id)
        );
    }

    #[tokio::test]
    async fn test_cycle_through_root_detected() {
        let store = InMemoryTenantStore::new();
        let mut a = build_tenant(NewTenant::root("A")).unwrap();
        let b = build_tenant(NewTenant::subsidiary("B", a.tenant_id)).unwrap();
        // Corrupt: A's parent is its own child.
        a.parent_tenant_id = Some(b.tenant_id);
        store.insert_unchecked(a.clone()).await;
        store.insert_unchecked(b).await;

        let err = hierarchy(&store, a.tenant_id, DEFAULT_MAX_DEPTH)
            .await
            .unwrap_err();
        assert!(matches!(err, TenancyError::CycleDetected { .. }));
    }

    #[tokio::test]
    async fn test_depth_bound() {
        let store = InMemoryTenantStore::new();
        let admin = TenantAdmin::new(&store);
        let mut parent = admin.create_root("L1", None).await.unwrap();
        let root_id = parent.tenant_id;
        for level in 2..=5 {
            parent = admin
                .create(NewTenant::subsidiary(format!("L{level}"), parent.tenant_id))
                .await
                .unwrap();
        }

        assert_eq!(hierarchy(&store, root_id, 5).await.unwrap().len(), 5);
        let err = hierarchy(&store, root_id, 4).await.unwrap_err();
        assert_eq!(
            err,
            TenancyError::CycleDetected {
                tenant_id: parent.tenant_id,
                depth: 5
            }
        );
    }

    #[tokio::test]
    async fn test_ensure_acyclic() {
        let store = InMemoryTenantStore::new();
        let admin = TenantAdmin::new(&store);
        let a = admin.create_root("A", None).await.unwrap();
        let b = admin
            .create(NewTenant::subsidiary("B", a.tenant_id))
            .await
            .unwrap();
        let c = admin
            .create(NewTenant::subsidiary("C", b.tenant_id))
            .await
            .unwrap();
        let other = admin.create_root("Other", None).await.unwrap();

        // Moving A under its own grandchild closes a loop.
        assert!(matches!(
            ensure_acyclic(&store, a.tenant_id, c.tenant_id, DEFAULT_MAX_DEPTH).await,
            Err(TenancyError::CycleDetected { .. })
        ));
        assert!(
            ensure_acyclic(&store, c.tenant_id, other.tenant_id, DEFAULT_MAX_DEPTH)
                .await
                .is_ok()
        );
    }
}
