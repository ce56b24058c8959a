//! Predicate enforcement around a tenant store.
//!
//! `TenantPolicy` is the in-process counterpart of the row-level security
//! policies installed on the `tenants` table. Every call re-reads the rows it
//! touches and re-evaluates the predicate against the current session
//! context; nothing is cached between calls.
//!
//! Rows the session cannot see are reported as `NotFound`, so a denied read
//! never reveals that a tenant exists. A mutation on a visible row whose
//! after-image fails the predicate is reported as `AccessDenied`.
//!
//! A session can never move a tenant. Parent links change only through
//! [`TenantAdmin::reassign_parent`](crate::tenancy::admin::TenantAdmin::reassign_parent).

use canopy_shared::types::TenantId;
use tracing::{debug, info, warn};

use crate::tenancy::context::SessionContext;
use crate::tenancy::error::{TenancyError, TenancyResult};
use crate::tenancy::predicate::can_access_row;
use crate::tenancy::store::TenantStore;
use crate::tenancy::types::{NewTenant, Tenant, TenantChanges};
use crate::tenancy::validation::{apply_changes, build_tenant};

/// A tenant store seen through one session.
#[derive(Debug, Clone)]
pub struct TenantPolicy<S> {
    store: S,
    ctx: SessionContext,
}

impl<S: TenantStore> TenantPolicy<S> {
    /// Wraps `store` for the session described by `ctx`.
    #[must_use]
    pub fn new(store: S, ctx: SessionContext) -> Self {
        Self { store, ctx }
    }

    /// Returns the wrapped store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the session context.
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Switches the acting tenant. See [`SessionContext::set_context`].
    pub async fn set_context(&mut self, tenant_id: TenantId) -> TenancyResult<()> {
        self.ctx.set_context(&self.store, tenant_id).await
    }

    /// Empties the session context.
    pub fn clear_context(&mut self) {
        self.ctx.clear_context();
    }

    /// Returns the acting tenant, if any.
    pub fn current_context(&self) -> Option<TenantId> {
        self.ctx.current_context()
    }

    /// Fetches a tenant visible to the session.
    ///
    /// # Errors
    ///
    /// `NotFound` if the row is absent or invisible.
    pub async fn get(&self, id: TenantId) -> TenancyResult<Tenant> {
        let session = self.current_context();
        match self.store.get(id).await? {
            Some(row) if can_access_row(session, &row) => Ok(row),
            _ => {
                debug!(tenant_id = %id, session = ?session, "Tenant not visible");
                Err(TenancyError::NotFound(id))
            }
        }
    }

    /// All tenants visible to the session, newest first.
    pub async fn list(&self) -> TenancyResult<Vec<Tenant>> {
        let session = self.current_context();
        let rows = self.store.list().await?;
        Ok(rows
            .into_iter()
            .filter(|row| can_access_row(session, row))
            .collect())
    }

    /// Visible direct children of `id`, ordered by name.
    pub async fn children_of(&self, id: TenantId) -> TenancyResult<Vec<Tenant>> {
        let session = self.current_context();
        let rows = self.store.children_of(id).await?;
        Ok(rows
            .into_iter()
            .filter(|row| can_access_row(session, row))
            .collect())
    }

    /// Creates a subsidiary of the acting tenant.
    ///
    /// # Errors
    ///
    /// `AccessDenied` unless the new row's parent is the acting tenant.
    pub async fn create(&self, input: NewTenant) -> TenancyResult<Tenant> {
        let session = self.current_context();
        let tenant = build_tenant(input)?;
        if !can_access_row(session, &tenant) {
            warn!(
                tenant_id = %tenant.tenant_id,
                parent_id = ?tenant.parent_tenant_id,
                session = ?session,
                "Tenant create denied"
            );
            return Err(TenancyError::AccessDenied(tenant.tenant_id));
        }

        let created = self.store.create(tenant).await?;
        info!(tenant_id = %created.tenant_id, session = ?session, "Tenant created");
        Ok(created)
    }

    /// Renames a tenant or replaces its metadata. The parent link and type
    /// are carried over unchanged.
    pub async fn update(&self, id: TenantId, changes: TenantChanges) -> TenancyResult<Tenant> {
        let current = self.visible_for_mutation(id, "update").await?;
        let after = apply_changes(&current, changes)?;
        self.check_after_image(&after, "update")?;
        self.store.update(after).await
    }

    /// Deletes a visible, childless tenant.
    ///
    /// # Errors
    ///
    /// `NotFound` if invisible, `HasDependents` if it has children.
    pub async fn delete(&self, id: TenantId) -> TenancyResult<()> {
        self.visible_for_mutation(id, "delete").await?;

        let children = self.store.children_of(id).await?.len();
        if children > 0 {
            warn!(tenant_id = %id, children, "Tenant delete blocked by children");
            return Err(TenancyError::HasDependents {
                tenant_id: id,
                children,
            });
        }

        self.store.delete(id).await?;
        info!(tenant_id = %id, "Tenant deleted");
        Ok(())
    }

    async fn visible_for_mutation(&self, id: TenantId, action: &str) -> TenancyResult<Tenant> {
        let session = self.current_context();
        match self.store.get(id).await? {
            Some(row) if can_access_row(session, &row) => Ok(row),
            _ => {
                warn!(tenant_id = %id, session = ?session, action, "Tenant mutation denied");
                Err(TenancyError::NotFound(id))
            }
        }
    }

    fn check_after_image(&self, after: &Tenant, action: &str) -> TenancyResult<()> {
        let session = self.current_context();
        if can_access_row(session, after) {
            return Ok(());
        }
        warn!(
            tenant_id = %after.tenant_id,
            parent_id = ?after.parent_tenant_id,
            session = ?session,
            action,
            "Tenant mutation would leave session scope"
        );
        Err(TenancyError::AccessDenied(after.tenant_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenancy::admin::TenantAdmin;
    use crate::tenancy::memory::InMemoryTenantStore;
    use serde_json::json;

    struct Fixture {
        store: InMemoryTenantStore,
        hsbc: Tenant,
        hk: Tenant,
        hk_retail: Tenant,
        barclays: Tenant,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryTenantStore::new();
        let admin = TenantAdmin::new(&store);
        let hsbc = admin.create_root("HSBC", None).await.unwrap();
        let hk = admin
            .create(NewTenant::subsidiary("HSBC-HK", hsbc.tenant_id))
            .await
            .unwrap();
        let hk_retail = admin
            .create(NewTenant::subsidiary("HSBC-HK Retail", hk.tenant_id))
            .await
            .unwrap();
        let barclays = admin.create_root("Barclays", None).await.unwrap();
        Fixture {
            store,
            hsbc,
            hk,
            hk_retail,
            barclays,
        }
    }

    fn session(store: &InMemoryTenantStore, id: TenantId) -> TenantPolicy<&InMemoryTenantStore> {
        TenantPolicy::new(store, SessionContext::from_raw(id.to_string()))
    }

    #[tokio::test]
    async fn test_list_filters_to_self_and_children() {
        let f = fixture().await;
        let policy = session(&f.store, f.hsbc.tenant_id);

        let mut ids: Vec<TenantId> = policy
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.tenant_id)
            .collect();
        ids.sort();
        let mut expected = vec![f.hsbc.tenant_id, f.hk.tenant_id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_get_invisible_reads_as_not_found() {
        let f = fixture().await;
        let policy = session(&f.store, f.hsbc.tenant_id);

        assert_eq!(
            policy.get(f.hk_retail.tenant_id).await.unwrap_err(),
            TenancyError::NotFound(f.hk_retail.tenant_id)
        );
        assert_eq!(
            policy.get(f.barclays.tenant_id).await.unwrap_err(),
            TenancyError::NotFound(f.barclays.tenant_id)
        );
    }

    #[tokio::test]
    async fn test_no_context_sees_nothing() {
        let f = fixture().await;
        let policy = TenantPolicy::new(&f.store, SessionContext::new());
        assert!(policy.list().await.unwrap().is_empty());
        assert!(policy.get(f.hsbc.tenant_id).await.is_err());
    }

    #[tokio::test]
    async fn test_children_of_hides_grandchildren() {
        let f = fixture().await;
        let policy = session(&f.store, f.hsbc.tenant_id);

        let children = policy.children_of(f.hsbc.tenant_id).await.unwrap();
        assert_eq!(children.len(), 1);
        assert!(policy.children_of(f.hk.tenant_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_requires_session_as_parent() {
        let f = fixture().await;
        let policy = session(&f.store, f.hsbc.tenant_id);

        let uk = policy
            .create(NewTenant::subsidiary("HSBC-UK", f.hsbc.tenant_id))
            .await
            .unwrap();
        assert_eq!(uk.parent_tenant_id, Some(f.hsbc.tenant_id));

        assert!(matches!(
            policy
                .create(NewTenant::subsidiary("Retail 2", f.hk.tenant_id))
                .await,
            Err(TenancyError::AccessDenied(_))
        ));
        assert!(matches!(
            policy.create(NewTenant::root("Rogue")).await,
            Err(TenancyError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_update_visible_row() {
        let f = fixture().await;
        let policy = session(&f.store, f.hsbc.tenant_id);

        let changes = TenantChanges {
            name: Some("HSBC Hong Kong".to_string()),
            metadata: Some(json!({"region": "APAC"})),
        };
        let updated = policy.update(f.hk.tenant_id, changes).await.unwrap();
        assert_eq!(updated.name, "HSBC Hong Kong");
        assert_eq!(updated.metadata["region"], "APAC");

        assert_eq!(
            policy
                .update(f.barclays.tenant_id, TenantChanges::default())
                .await
                .unwrap_err(),
            TenancyError::NotFound(f.barclays.tenant_id)
        );
    }

    #[tokio::test]
    async fn test_own_update_keeps_parent_link() {
        let f = fixture().await;
        let hk_session = session(&f.store, f.hk.tenant_id);

        let renamed = hk_session
            .update(
                f.hk.tenant_id,
                TenantChanges {
                    name: Some("HSBC Asia".to_string()),
                    metadata: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.parent_tenant_id, Some(f.hsbc.tenant_id));
        assert_eq!(renamed.tenant_type, f.hk.tenant_type);

        // The parent keeps its one-hop view of the renamed subsidiary.
        let parent_session = session(&f.store, f.hsbc.tenant_id);
        assert_eq!(
            parent_session.get(f.hk.tenant_id).await.unwrap().name,
            "HSBC Asia"
        );
        // Barclays gained nothing.
        assert!(
            session(&f.store, f.barclays.tenant_id)
                .get(f.hk.tenant_id)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_delete_requires_visibility_and_no_children() {
        let f = fixture().await;
        let policy = session(&f.store, f.hsbc.tenant_id);

        assert!(matches!(
            policy.delete(f.hk.tenant_id).await,
            Err(TenancyError::HasDependents { children: 1, .. })
        ));
        assert_eq!(
            policy.delete(f.hk_retail.tenant_id).await.unwrap_err(),
            TenancyError::NotFound(f.hk_retail.tenant_id)
        );

        let hk_policy = session(&f.store, f.hk.tenant_id);
        hk_policy.delete(f.hk_retail.tenant_id).await.unwrap();
        policy.delete(f.hk.tenant_id).await.unwrap();
        assert!(f.store.get(f.hk.tenant_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_predicate_reevaluated_after_context_switch() {
        let f = fixture().await;
        let mut policy = TenantPolicy::new(&f.store, SessionContext::new());

        policy.set_context(f.hsbc.tenant_id).await.unwrap();
        assert!(policy.get(f.hk.tenant_id).await.is_ok());

        policy.set_context(f.barclays.tenant_id).await.unwrap();
        assert!(policy.get(f.hk.tenant_id).await.is_err());

        policy.clear_context();
        assert_eq!(policy.current_context(), None);
        assert!(policy.get(f.barclays.tenant_id).await.is_err());
    }
}
