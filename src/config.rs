use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, error};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins, comma separated
    pub cors_origins: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Name this service presents to the app service
    #[serde(default = "default_service_name")]
    pub cloud_service_name: String,

    /// JWT secret key
    pub cloud_auth_jwt_secret: Option<String>,

    /// Base URL of the project/file metadata service
    pub app_service_url: Option<String>,

    #[serde(default = "default_app_service_timeout_secs")]
    pub app_service_timeout_secs: u64,

    /// Directory holding `<project>/<path>` file contents
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Quiet period before a dirty document is written back
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,

    /// Inactivity after which a document leaves memory
    #[serde(default = "default_idle_eviction_secs")]
    pub idle_eviction_secs: u64,

    #[serde(default = "default_access_cache_capacity")]
    pub access_cache_capacity: u64,

    #[serde(default = "default_access_cache_ttl_secs")]
    pub access_cache_ttl_secs: u64,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        match envy::from_env::<Config>() {
            Ok(config) => {
                info!("✅ Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("❌ Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// Settings without which the service cannot authenticate or reach storage metadata.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cloud_auth_jwt_secret.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Missing("CLOUD_AUTH_JWT_SECRET"));
        }
        if self.app_service_url.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Missing("APP_SERVICE_URL"));
        }
        Ok(())
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn idle_eviction(&self) -> Duration {
        Duration::from_secs(self.idle_eviction_secs)
    }

    pub fn access_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.access_cache_ttl_secs)
    }

    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            cors_origins: None,
            cloud_service_name: default_service_name(),
            cloud_auth_jwt_secret: None,
            app_service_url: None,
            app_service_timeout_secs: default_app_service_timeout_secs(),
            storage_root: default_storage_root(),
            save_debounce_ms: default_save_debounce_ms(),
            idle_eviction_secs: default_idle_eviction_secs(),
            access_cache_capacity: default_access_cache_capacity(),
            access_cache_ttl_secs: default_access_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvError(#[from] envy::Error),
    #[error("Missing required setting {0}")]
    Missing(&'static str),
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "colabri-sync".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_app_service_timeout_secs() -> u64 {
    10
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./data")
}

fn default_save_debounce_ms() -> u64 {
    5_000
}

fn default_idle_eviction_secs() -> u64 {
    5 * 60
}

fn default_access_cache_capacity() -> u64 {
    500
}

fn default_access_cache_ttl_secs() -> u64 {
    5 * 60
}
