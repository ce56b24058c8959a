//! Row-level security policies on `tenants`.
//!
//! Each policy is created only if no policy of that name exists yet, so the
//! migration also repairs databases where some policies were installed by
//! hand.
//!
//! Policies cannot tell which columns an update touched, so parent links are
//! additionally frozen for tenant sessions by the `tenants_guard_parent_link`
//! trigger. Reassignment happens on the owner connection with no context.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        install(manager.get_connection()).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_POLICIES_SQL).await?;
        Ok(())
    }
}

/// Creates every missing policy.
pub(super) async fn install<C>(db: &C) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    for sql in [
        SELECT_POLICY_SQL,
        INSERT_POLICY_SQL,
        UPDATE_POLICY_SQL,
        DELETE_POLICY_SQL,
        PARENT_LINK_GUARD_SQL,
    ] {
        db.execute_unprepared(sql).await?;
    }
    db.execute_unprepared("ALTER TABLE tenants ENABLE ROW LEVEL SECURITY;")
        .await?;
    Ok(())
}

const SELECT_POLICY_SQL: &str = r"
DO $$
BEGIN
    IF NOT EXISTS (
        SELECT 1 FROM pg_policies
        WHERE tablename = 'tenants' AND policyname = 'tenant_select_policy'
    ) THEN
        CREATE POLICY tenant_select_policy ON tenants
            FOR SELECT
            USING (can_access_tenant_row(tenant_id, parent_tenant_id));
    END IF;
END $$;
";

const INSERT_POLICY_SQL: &str = r"
DO $$
BEGIN
    IF NOT EXISTS (
        SELECT 1 FROM pg_policies
        WHERE tablename = 'tenants' AND policyname = 'tenant_insert_policy'
    ) THEN
        -- A session may only add direct children of itself.
        CREATE POLICY tenant_insert_policy ON tenants
            FOR INSERT
            WITH CHECK (can_access_tenant_row(tenant_id, parent_tenant_id));
    END IF;
END $$;
";

const UPDATE_POLICY_SQL: &str = r"
DO $$
BEGIN
    IF NOT EXISTS (
        SELECT 1 FROM pg_policies
        WHERE tablename = 'tenants' AND policyname = 'tenant_update_policy'
    ) THEN
        CREATE POLICY tenant_update_policy ON tenants
            FOR UPDATE
            USING (can_access_tenant_row(tenant_id, parent_tenant_id))
            WITH CHECK (can_access_tenant_row(tenant_id, parent_tenant_id));
    END IF;
END $$;
";

const DELETE_POLICY_SQL: &str = r"
DO $$
BEGIN
    IF NOT EXISTS (
        SELECT 1 FROM pg_policies
        WHERE tablename = 'tenants' AND policyname = 'tenant_delete_policy'
    ) THEN
        CREATE POLICY tenant_delete_policy ON tenants
            FOR DELETE
            USING (
                can_access_tenant_row(tenant_id, parent_tenant_id)
                AND NOT tenant_has_children(tenant_id)
            );
    END IF;
END $$;
";

const PARENT_LINK_GUARD_SQL: &str = r"
CREATE OR REPLACE FUNCTION guard_tenant_parent_link()
RETURNS TRIGGER AS $$
BEGIN
    IF current_tenant_id() IS NOT NULL
       AND (NEW.parent_tenant_id IS DISTINCT FROM OLD.parent_tenant_id
            OR NEW.tenant_type IS DISTINCT FROM OLD.tenant_type) THEN
        RAISE EXCEPTION 'Parent link of tenant % can only be changed administratively', OLD.tenant_id
            USING ERRCODE = 'insufficient_privilege';
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql SET search_path = public;

CREATE OR REPLACE TRIGGER tenants_guard_parent_link
    BEFORE UPDATE ON tenants
    FOR EACH ROW
    EXECUTE FUNCTION guard_tenant_parent_link();
";

const DROP_POLICIES_SQL: &str = r"
DROP TRIGGER IF EXISTS tenants_guard_parent_link ON tenants;
DROP FUNCTION IF EXISTS guard_tenant_parent_link();
DROP POLICY IF EXISTS tenant_delete_policy ON tenants;
DROP POLICY IF EXISTS tenant_update_policy ON tenants;
DROP POLICY IF EXISTS tenant_insert_policy ON tenants;
DROP POLICY IF EXISTS tenant_select_policy ON tenants;
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::REQUIRED_FUNCTIONS;

    #[test]
    fn test_policy_functions_are_health_checked() {
        let policies = [SELECT_POLICY_SQL, INSERT_POLICY_SQL, UPDATE_POLICY_SQL, DELETE_POLICY_SQL].concat();
        for called in ["can_access_tenant_row", "tenant_has_children"] {
            assert!(policies.contains(called));
            assert!(REQUIRED_FUNCTIONS.contains(&called), "{called} missing from health check");
        }
    }

    #[test]
    fn test_parent_link_guard_only_binds_tenant_sessions() {
        assert!(PARENT_LINK_GUARD_SQL.contains("current_tenant_id() IS NOT NULL"));
        assert!(
            PARENT_LINK_GUARD_SQL
                .contains("NEW.parent_tenant_id IS DISTINCT FROM OLD.parent_tenant_id")
        );
        assert!(PARENT_LINK_GUARD_SQL.contains("BEFORE UPDATE ON tenants"));
        assert!(DROP_POLICIES_SQL.contains("DROP TRIGGER IF EXISTS tenants_guard_parent_link"));
    }
}
