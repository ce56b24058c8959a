//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - The PostgreSQL tenant store
//! - Session-scoped tenant reads for request handlers
//! - Row-level security context handling
//! - Database migrations (table, predicate functions, policies)

pub mod directory;
pub mod entities;
pub mod health;
pub mod migration;
pub mod repositories;
pub mod rls;

pub use directory::PgTenantDirectory;
pub use health::PgHealthProbe;
pub use repositories::TenantRepository;
pub use rls::{RlsConnection, RlsExt};

use canopy_shared::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection using the configured limits.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}
