//! Database migrations.
//!
//! Migrations are managed using sea-orm-migration.

pub use sea_orm_migration::prelude::*;

mod m20250805_000001_tenants;
mod m20250812_000002_rls_functions;
mod m20250812_000003_rls_policies;

pub use m20250812_000002_rls_functions::REQUIRED_FUNCTIONS;

/// Migrator for running database migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250805_000001_tenants::Migration),
            Box::new(m20250812_000002_rls_functions::Migration),
            Box::new(m20250812_000003_rls_policies::Migration),
        ]
    }
}

/// Reinstalls the RLS functions and any missing policies on a migrated
/// database. Safe to run any number of times.
///
/// # Errors
///
/// Returns an error if a statement fails.
pub async fn install_rls<C>(db: &C) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    m20250812_000002_rls_functions::install(db).await?;
    m20250812_000003_rls_policies::install(db).await
}
