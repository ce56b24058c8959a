//! Installs the tenant context and access predicate functions.
//!
//! Every function is `CREATE OR REPLACE`, so reapplying this migration (or
//! running the SQL by hand on a database that already has it) is harmless.

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
        // Policies reference the predicate functions.
        db.execute_unprepared(DROP_POLICIES_SQL).await?;
        db.execute_unprepared(DROP_FUNCTIONS_SQL).await?;
        Ok(())
    }
}

/// Creates or replaces every function.
pub(super) async fn install<C>(db: &C) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    db.execute_unprepared(CONTEXT_FUNCTIONS_SQL).await?;
    db.execute_unprepared(PREDICATE_FUNCTIONS_SQL).await?;
    db.execute_unprepared(HIERARCHY_FUNCTION_SQL).await?;
    db.execute_unprepared(COMMENTS_SQL).await?;
    Ok(())
}

/// Names of the functions the health check expects to find in `pg_proc`:
/// the session API plus everything the policies call.
pub const REQUIRED_FUNCTIONS: [&str; 7] = [
    "current_tenant_id",
    "can_access_tenant",
    "can_access_tenant_row",
    "tenant_has_children",
    "set_tenant_context",
    "clear_tenant_context",
    "get_tenant_hierarchy",
];

const CONTEXT_FUNCTIONS_SQL: &str = r"
-- NULL when unset, empty or not a UUID.
CREATE OR REPLACE FUNCTION current_tenant_id()
RETURNS UUID AS $$
BEGIN
    RETURN NULLIF(current_setting('app.current_tenant_id', true), '')::UUID;
EXCEPTION
    WHEN OTHERS THEN
        RETURN NULL;
END;
$$ LANGUAGE plpgsql STABLE;

-- Transaction scoped. Existence is checked outside RLS.
CREATE OR REPLACE FUNCTION set_tenant_context(tenant_uuid UUID)
RETURNS VOID AS $$
BEGIN
    IF NOT EXISTS (SELECT 1 FROM tenants WHERE tenant_id = tenant_uuid) THEN
        RAISE EXCEPTION 'Tenant % does not exist', tenant_uuid
            USING ERRCODE = 'no_data_found';
    END IF;

    PERFORM set_config('app.current_tenant_id', tenant_uuid::text, true);
END;
$$ LANGUAGE plpgsql SECURITY DEFINER SET search_path = public;

CREATE OR REPLACE FUNCTION clear_tenant_context()
RETURNS VOID AS $$
BEGIN
    PERFORM set_config('app.current_tenant_id', '', true);
END;
$$ LANGUAGE plpgsql;
";

const PREDICATE_FUNCTIONS_SQL: &str = r"
-- Row form used by the policies on tenants itself: evaluates the row image
-- directly, so WITH CHECK sees the new parent and no recursive lookup on
-- tenants is needed.
CREATE OR REPLACE FUNCTION can_access_tenant_row(target_tenant_id UUID, target_parent_id UUID)
RETURNS BOOLEAN AS $$
    SELECT COALESCE(
        current_tenant_id() = target_tenant_id
            OR current_tenant_id() = target_parent_id,
        FALSE
    );
$$ LANGUAGE sql STABLE;

-- Self, or direct parent of the target. One hop only.
CREATE OR REPLACE FUNCTION can_access_tenant(target_tenant_id UUID)
RETURNS BOOLEAN AS $$
DECLARE
    session_tenant_id UUID;
    target_parent_id UUID;
BEGIN
    session_tenant_id := current_tenant_id();

    IF session_tenant_id IS NULL THEN
        RETURN FALSE;
    END IF;

    IF session_tenant_id = target_tenant_id THEN
        RETURN TRUE;
    END IF;

    SELECT t.parent_tenant_id INTO target_parent_id
    FROM tenants t
    WHERE t.tenant_id = target_tenant_id;

    RETURN COALESCE(target_parent_id = session_tenant_id, FALSE);
END;
$$ LANGUAGE plpgsql STABLE SECURITY DEFINER SET search_path = public;

CREATE OR REPLACE FUNCTION tenant_has_children(target_tenant_id UUID)
RETURNS BOOLEAN AS $$
    SELECT EXISTS (
        SELECT 1 FROM tenants child WHERE child.parent_tenant_id = target_tenant_id
    );
$$ LANGUAGE sql STABLE SECURITY DEFINER SET search_path = public;
";

const HIERARCHY_FUNCTION_SQL: &str = r"
CREATE OR REPLACE FUNCTION get_tenant_hierarchy(root_tenant_id UUID, max_depth INTEGER DEFAULT 32)
RETURNS TABLE (
    tenant_id UUID,
    name VARCHAR(200),
    tenant_type tenant_type,
    level INTEGER,
    path TEXT
) AS $$
#variable_conflict use_column
DECLARE
    rec RECORD;
BEGIN
    FOR rec IN
        WITH RECURSIVE tenant_tree AS (
            SELECT
                t.tenant_id,
                t.name,
                t.tenant_type,
                1 AS level,
                t.name::TEXT AS path,
                ARRAY[t.tenant_id] AS visited,
                FALSE AS is_cycle
            FROM tenants t
            WHERE t.tenant_id = root_tenant_id

            UNION ALL

            SELECT
                t.tenant_id,
                t.name,
                t.tenant_type,
                tt.level + 1,
                tt.path || ' -> ' || t.name,
                tt.visited || t.tenant_id,
                t.tenant_id = ANY(tt.visited)
            FROM tenants t
            JOIN tenant_tree tt ON t.parent_tenant_id = tt.tenant_id
            WHERE NOT tt.is_cycle AND tt.level <= max_depth
        )
        SELECT * FROM tenant_tree ORDER BY level, name
    LOOP
        IF rec.is_cycle OR rec.level > max_depth THEN
            RAISE EXCEPTION 'Tenant hierarchy cycle detected at % (depth %)', rec.tenant_id, rec.level
                USING ERRCODE = 'data_exception';
        END IF;

        tenant_id := rec.tenant_id;
        name := rec.name;
        tenant_type := rec.tenant_type;
        level := rec.level;
        path := rec.path;
        RETURN NEXT;
    END LOOP;
END;
$$ LANGUAGE plpgsql STABLE;
";

const COMMENTS_SQL: &str = r"
COMMENT ON FUNCTION current_tenant_id() IS 'Current tenant context from the session variable';
COMMENT ON FUNCTION can_access_tenant(UUID) IS 'Whether the current session may access the given tenant';
COMMENT ON FUNCTION can_access_tenant_row(UUID, UUID) IS 'Access predicate over a tenant row image';
COMMENT ON FUNCTION tenant_has_children(UUID) IS 'Whether any tenant names the given tenant as parent';
COMMENT ON FUNCTION set_tenant_context(UUID) IS 'Sets the tenant context for the current transaction';
COMMENT ON FUNCTION clear_tenant_context() IS 'Clears the tenant context for the current transaction';
COMMENT ON FUNCTION get_tenant_hierarchy(UUID, INTEGER) IS 'Tenant and all descendants, ordered by level and name';
";

const DROP_POLICIES_SQL: &str = r"
DROP TRIGGER IF EXISTS tenants_guard_parent_link ON tenants;
DROP FUNCTION IF EXISTS guard_tenant_parent_link();
DROP POLICY IF EXISTS tenant_delete_policy ON tenants;
DROP POLICY IF EXISTS tenant_update_policy ON tenants;
DROP POLICY IF EXISTS tenant_insert_policy ON tenants;
DROP POLICY IF EXISTS tenant_select_policy ON tenants;
";

const DROP_FUNCTIONS_SQL: &str = r"
DROP FUNCTION IF EXISTS get_tenant_hierarchy(UUID, INTEGER);
DROP FUNCTION IF EXISTS clear_tenant_context();
DROP FUNCTION IF EXISTS set_tenant_context(UUID);
DROP FUNCTION IF EXISTS tenant_has_children(UUID);
DROP FUNCTION IF EXISTS can_access_tenant(UUID);
DROP FUNCTION IF EXISTS can_access_tenant_row(UUID, UUID);
DROP FUNCTION IF EXISTS current_tenant_id();
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_functions_are_all_installed() {
        let installed = [CONTEXT_FUNCTIONS_SQL, PREDICATE_FUNCTIONS_SQL, HIERARCHY_FUNCTION_SQL].concat();
        for name in REQUIRED_FUNCTIONS {
            assert!(
                installed.contains(&format!("CREATE OR REPLACE FUNCTION {name}(")),
                "{name} is required but never created"
            );
            assert!(DROP_FUNCTIONS_SQL.contains(&format!("DROP FUNCTION IF EXISTS {name}(")));
        }
    }
}
