//! Property-based tests for the access predicate.

use canopy_shared::types::TenantId;
use proptest::prelude::*;
use uuid::Uuid;

use super::admin::TenantAdmin;
use super::memory::InMemoryTenantStore;
use super::predicate::{can_access, can_access_in};
use super::types::NewTenant;

fn tenant_id() -> impl Strategy<Value = TenantId> {
    any::<u128>().prop_map(|n| TenantId::from(Uuid::from_u128(n)))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A tenant always reaches its own rows, whatever its parent.
    #[test]
    fn prop_self_access(t in tenant_id(), parent in proptest::option::of(tenant_id())) {
        prop_assert!(can_access(Some(t), t, parent));
    }

    /// A parent reaches its child; the child does not reach its parent.
    #[test]
    fn prop_parent_child_asymmetry(
        p in tenant_id(),
        c in tenant_id(),
        grand in proptest::option::of(tenant_id()),
    ) {
        prop_assume!(p != c);
        prop_assume!(grand != Some(c));
        prop_assert!(can_access(Some(p), c, Some(p)));
        prop_assert!(!can_access(Some(c), p, grand));
    }

    /// Siblings never see each other.
    #[test]
    fn prop_siblings_isolated(s1 in tenant_id(), s2 in tenant_id(), p in tenant_id()) {
        prop_assume!(s1 != s2 && s1 != p && s2 != p);
        prop_assert!(!can_access(Some(s1), s2, Some(p)));
        prop_assert!(!can_access(Some(s2), s1, Some(p)));
    }

    /// Access is one hop deep: grandparents are denied.
    #[test]
    fn prop_grandparent_denied(g in tenant_id(), p in tenant_id(), c in tenant_id()) {
        prop_assume!(g != p && g != c && p != c);
        prop_assert!(!can_access(Some(g), c, Some(p)));
    }

    /// No session, no access.
    #[test]
    fn prop_unset_session_denied(t in tenant_id(), parent in proptest::option::of(tenant_id())) {
        prop_assert!(!can_access(None, t, parent));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// On a chain T0 -> T1 -> ... -> Tn, Ti reaches Tj exactly when j is i
    /// or i + 1.
    #[test]
    fn prop_chain_access_is_one_hop(len in 1usize..8) {
        let rt = runtime();
        rt.block_on(async {
            let store = InMemoryTenantStore::new();
            let admin = TenantAdmin::new(&store);
            let mut chain = vec![admin.create_root("T0", None).await.unwrap()];
            for i in 1..len {
                let parent = chain[i - 1].tenant_id;
                chain.push(
                    admin
                        .create(NewTenant::subsidiary(format!("T{i}"), parent))
                        .await
                        .unwrap(),
                );
            }

            for (i, session) in chain.iter().enumerate() {
                for (j, target) in chain.iter().enumerate() {
                    let allowed =
                        can_access_in(&store, Some(session.tenant_id), target.tenant_id).await;
                    prop_assert_eq!(allowed, j == i || j == i + 1, "T{} -> T{}", i, j);
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
