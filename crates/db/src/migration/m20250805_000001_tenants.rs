//! Creates the `tenants` table.
//!
//! The table mirrors the validation rules of `canopy_core::tenancy`:
//! type/parent consistency, no self reference, non-empty names unique among
//! siblings, and a parent link that blocks deleting a tenant with children.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(ENUMS_SQL).await?;
        db.execute_unprepared(TENANTS_SQL).await?;
        db.execute_unprepared(INDEXES_SQL).await?;
        db.execute_unprepared(TRIGGERS_SQL).await?;

        // Policies are added by m20250812_000003; until then RLS denies all
        // non-owner access.
        db.execute_unprepared("ALTER TABLE tenants ENABLE ROW LEVEL SECURITY;")
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

const ENUMS_SQL: &str = r"
DO $$
BEGIN
    IF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = 'tenant_type') THEN
        CREATE TYPE tenant_type AS ENUM ('parent', 'subsidiary');
    END IF;
END $$;
";

const TENANTS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS tenants (
    tenant_id        UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name             VARCHAR(200) NOT NULL,
    tenant_type      tenant_type NOT NULL,
    parent_tenant_id UUID,
    metadata         JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT fk_tenant_parent
        FOREIGN KEY (parent_tenant_id) REFERENCES tenants (tenant_id)
        ON DELETE RESTRICT,
    CONSTRAINT ck_tenant_parent_logic CHECK (
        (tenant_type = 'parent' AND parent_tenant_id IS NULL)
        OR (tenant_type = 'subsidiary' AND parent_tenant_id IS NOT NULL)
    ),
    CONSTRAINT ck_tenant_no_self_reference CHECK (tenant_id <> parent_tenant_id),
    CONSTRAINT ck_tenant_name_not_empty CHECK (trim(name) <> ''),
    CONSTRAINT ck_tenant_metadata_object CHECK (jsonb_typeof(metadata) = 'object')
);

COMMENT ON TABLE tenants IS 'Tenant forest: parent tenants and their subsidiaries';
COMMENT ON COLUMN tenants.name IS 'Human-readable name, unique among siblings';
";

// NULLS NOT DISTINCT makes root names unique too (PostgreSQL 15+).
const INDEXES_SQL: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS uq_tenant_name_per_parent
    ON tenants (name, parent_tenant_id) NULLS NOT DISTINCT;
CREATE INDEX IF NOT EXISTS ix_tenant_parent_id ON tenants (parent_tenant_id);
CREATE INDEX IF NOT EXISTS ix_tenant_type ON tenants (tenant_type);
CREATE INDEX IF NOT EXISTS ix_tenant_name_lower ON tenants (lower(name));
CREATE INDEX IF NOT EXISTS ix_tenant_created_at ON tenants (created_at DESC);
CREATE INDEX IF NOT EXISTS ix_tenant_metadata ON tenants USING gin (metadata);
";

const TRIGGERS_SQL: &str = r"
CREATE OR REPLACE FUNCTION tenants_set_updated_at()
RETURNS TRIGGER AS $$
BEGIN
    NEW.updated_at = NOW();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS trg_tenants_updated_at ON tenants;
CREATE TRIGGER trg_tenants_updated_at
    BEFORE UPDATE ON tenants
    FOR EACH ROW
    EXECUTE FUNCTION tenants_set_updated_at();
";

const DROP_ALL_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_tenants_updated_at ON tenants;
DROP FUNCTION IF EXISTS tenants_set_updated_at();
DROP TABLE IF EXISTS tenants;
DROP TYPE IF EXISTS tenant_type;
";
