//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Tenant isolation settings.
    #[serde(default)]
    pub tenancy: TenancyConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL (table owner; migrations, health, admin).
    pub url: String,
    /// Connection URL of the non-owner role that row-level security applies
    /// to. Request handlers read tenants through it.
    #[serde(default)]
    pub app_url: Option<String>,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl DatabaseConfig {
    /// Settings for the application role pool: same limits, `app_url`
    /// in place of `url`. `None` when no application role is configured.
    #[must_use]
    pub fn app_role(&self) -> Option<Self> {
        self.app_url.as_ref().map(|url| Self {
            url: url.clone(),
            app_url: None,
            ..self.clone()
        })
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Tenant isolation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TenancyConfig {
    /// Request header carrying the acting tenant id.
    #[serde(default = "default_header_name")]
    pub header_name: String,
    /// Upper bound on hierarchy traversal depth before the store is
    /// considered corrupted.
    #[serde(default = "default_max_hierarchy_depth")]
    pub max_hierarchy_depth: u32,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            header_name: default_header_name(),
            max_hierarchy_depth: default_max_hierarchy_depth(),
        }
    }
}

fn default_header_name() -> String {
    "X-Tenant-ID".to_string()
}

fn default_max_hierarchy_depth() -> u32 {
    32
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("CANOPY").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
