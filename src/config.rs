use std::collections::HashMap;

use config::{Config as ConfigLib, ConfigError, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Token shipped as default so a fresh checkout boots; must be overridden in any real deployment.
pub const DEFAULT_BEARER_TOKEN: &str = "CHANGE_ME_IN_PROD";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// PEM files used to terminate TLS in front of the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub bearer_token: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string; its scheme selects the store backend.
    ///
    /// - `sqlite:` for the SQLite store
    /// - `postgres://` or `postgresql://` for the PostgreSQL store
    /// - `redis://` or `rediss://` for the Redis store
    /// - `memory://` for the in-process store
    pub url: SecretString,
    /// Create the schema on boot.
    pub run_migrations: bool,
    pub max_connections: u32,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("server.host", "localhost")?
            .set_default("server.port", 3000)?
            .set_default("auth.bearer_token", DEFAULT_BEARER_TOKEN)?
            .set_default("database.url", "sqlite://local.db?mode=rwc")?
            .set_default("database.run_migrations", false)?
            .set_default("database.max_connections", 5)?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Should be in the format APP_SERVER__HOST or APP_DATABASE__URL
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}
