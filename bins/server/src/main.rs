//! Canopy API Server
//!
//! Main entry point for the Canopy tenant health service.

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use canopy_api::{AppState, create_router};
use canopy_db::{PgHealthProbe, PgTenantDirectory, connect_with};
use canopy_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canopy=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load()?;

    // Connect to database (owner role: the health check creates a throwaway root)
    let db = connect_with(&config.database).await?;
    info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );

    // Tenant reads go through the role the policies apply to
    let app_db = match config.database.app_role() {
        Some(app_role) => connect_with(&app_role).await?,
        None => {
            warn!("No application role configured; tenant reads bypass row-level security");
            db.clone()
        }
    };
    info!(
        header = %config.tenancy.header_name,
        max_hierarchy_depth = config.tenancy.max_hierarchy_depth,
        "Tenancy configured"
    );

    // Create application state and router
    let state = AppState::new(PgHealthProbe::new(db), PgTenantDirectory::new(app_db))
        .with_tenancy(config.tenancy);
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
