//! Database seeder for Canopy development and testing.
//!
//! Seeds a small banking hierarchy for local development:
//!
//! ```text
//! HSBC
//! ├── HSBC-HK
//! │   └── HSBC-HK Retail
//! └── HSBC-UK
//! Barclays
//! ```
//!
//! Usage: cargo run --bin seeder [-- --reinstall-rls]
//!
//! Must run as the table owner (`DATABASE_URL`), since roots cannot be
//! created through a tenant session.

use anyhow::Context;
use canopy_core::tenancy::{NewTenant, Tenant, TenantAdmin, TenantStore};
use canopy_db::TenantRepository;
use canopy_db::migration::install_rls;
use canopy_shared::types::TenantId;
use sea_orm::DatabaseConnection;
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

    println!("Connecting to database...");
    let db = canopy_db::connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    if std::env::args().any(|arg| arg == "--reinstall-rls") {
        println!("Reinstalling RLS functions and policies...");
        install_rls(&db).await?;
    }

    println!("Seeding tenants...");
    seed_tenants(&db).await?;

    println!("Seeding complete!");
    Ok(())
}

/// Seeds the banking hierarchy, skipping tenants that already exist.
async fn seed_tenants(db: &DatabaseConnection) -> anyhow::Result<()> {
    let store = TenantRepository::new(db);
    let admin = TenantAdmin::new(&store);
    let existing = store.list().await?;

    let hsbc = ensure(
        &admin,
        &existing,
        NewTenant::root("HSBC").with_metadata(json!({ "region": "global" })),
    )
    .await?;
    let hsbc_hk = ensure(
        &admin,
        &existing,
        NewTenant::subsidiary("HSBC-HK", hsbc.tenant_id)
            .with_metadata(json!({ "region": "apac" })),
    )
    .await?;
    ensure(
        &admin,
        &existing,
        NewTenant::subsidiary("HSBC-HK Retail", hsbc_hk.tenant_id),
    )
    .await?;
    ensure(
        &admin,
        &existing,
        NewTenant::subsidiary("HSBC-UK", hsbc.tenant_id).with_metadata(json!({ "region": "emea" })),
    )
    .await?;
    ensure(
        &admin,
        &existing,
        NewTenant::root("Barclays").with_metadata(json!({ "region": "emea" })),
    )
    .await?;

    Ok(())
}

async fn ensure<S: TenantStore>(
    admin: &TenantAdmin<S>,
    existing: &[Tenant],
    input: NewTenant,
) -> anyhow::Result<Tenant> {
    if let Some(tenant) = find(existing, &input.name, input.parent_tenant_id) {
        println!("  {} already exists, skipping...", tenant.name);
        return Ok(tenant.clone());
    }

    let tenant = admin.create(input).await?;
    println!("  Created {} ({})", tenant.name, tenant.tenant_id);
    Ok(tenant)
}

fn find<'a>(existing: &'a [Tenant], name: &str, parent: Option<TenantId>) -> Option<&'a Tenant> {
    existing
        .iter()
        .find(|t| t.name == name && t.parent_tenant_id == parent)
}
