//! Property-based tests for hierarchy traversal over random forests.

use std::collections::HashMap;

use canopy_shared::types::TenantId;
use proptest::prelude::*;
use proptest::sample::Index;

use super::admin::TenantAdmin;
use super::hierarchy::{DEFAULT_MAX_DEPTH, hierarchy};
use super::memory::InMemoryTenantStore;
use super::types::{NewTenant, Tenant};

/// Node 0 is always a root. Node k > 0 is a root when its flag is set,
/// otherwise a child of an earlier node.
fn forest_shape() -> impl Strategy<Value = Vec<Option<usize>>> {
    prop::collection::vec((any::<bool>(), any::<Index>()), 0..24).prop_map(|nodes| {
        let mut parents = vec![None];
        for (k, (is_root, idx)) in nodes.into_iter().enumerate() {
            let position = k + 1;
            parents.push(if is_root { None } else { Some(idx.index(position)) });
        }
        parents
    })
}

async fn build(store: &InMemoryTenantStore, parents: &[Option<usize>]) -> Vec<Tenant> {
    let admin = TenantAdmin::new(store);
    let mut tenants: Vec<Tenant> = Vec::with_capacity(parents.len());
    for (k, parent) in parents.iter().enumerate() {
        let name = format!("T{k:02}");
        let tenant = match parent {
            None => admin.create_root(&name, None).await.unwrap(),
            Some(p) => admin
                .create(NewTenant::subsidiary(name, tenants[*p].tenant_id))
                .await
                .unwrap(),
        };
        tenants.push(tenant);
    }
    tenants
}

fn subtree_size(parents: &[Option<usize>], root: usize) -> usize {
    1 + (0..parents.len())
        .filter(|&k| parents[k] == Some(root))
        .map(|k| subtree_size(parents, k))
        .sum::<usize>()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Every hierarchy starts at its root at depth 1, is ordered by
    /// `(depth, name)`, places each node one level below its parent, and
    /// covers exactly the root's subtree.
    #[test]
    fn prop_hierarchy_shape(parents in forest_shape()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let store = InMemoryTenantStore::new();
            let tenants = build(&store, &parents).await;
            let index: HashMap<TenantId, usize> = tenants
                .iter()
                .enumerate()
                .map(|(k, t)| (t.tenant_id, k))
                .collect();

            let mut covered = 0;
            for (root, _) in parents.iter().enumerate().filter(|(_, p)| p.is_none()) {
                let rows = hierarchy(&store, tenants[root].tenant_id, DEFAULT_MAX_DEPTH)
                    .await
                    .unwrap();

                prop_assert_eq!(rows[0].tenant_id, tenants[root].tenant_id);
                prop_assert_eq!(rows[0].depth, 1);
                prop_assert_eq!(rows.iter().filter(|r| r.depth == 1).count(), 1);
                prop_assert_eq!(rows.len(), subtree_size(&parents, root));

                for pair in rows.windows(2) {
                    prop_assert!(
                        (pair[0].depth, &pair[0].name) <= (pair[1].depth, &pair[1].name)
                    );
                }

                let depth_of: HashMap<TenantId, u32> =
                    rows.iter().map(|r| (r.tenant_id, r.depth)).collect();
                for row in &rows[1..] {
                    let k = index[&row.tenant_id];
                    let parent = tenants[parents[k].unwrap()].tenant_id;
                    prop_assert_eq!(row.depth, depth_of[&parent] + 1);
                    prop_assert!(row.path.ends_with(&row.name));
                    prop_assert_eq!(row.path.matches(" -> ").count() + 1, row.depth as usize);
                }
                covered += rows.len();
            }
            prop_assert_eq!(covered, tenants.len());
            Ok::<(), TestCaseError>(())
        })?;
    }
}
