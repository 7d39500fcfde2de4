//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The database URL is referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub betting: BettingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_cors_origin")]
    pub cors_allow_origin: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url_env: String,
    pub default_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Tunables for the betting engines.
#[derive(Debug, Deserialize, Clone)]
pub struct BettingConfig {
    /// Deadline applied to every individual store call.
    pub store_timeout_ms: u64,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self { store_timeout_ms: 5_000 }
    }
}

impl BettingConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Request header carrying the authenticated user id, set by the
    /// gateway in front of this service.
    pub user_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { user_header: "x-user-id".to_string() }
    }
}

impl ServerConfig {
    /// Deadline for a whole HTTP request, enforced by the router.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn default_cors_origin() -> String {
    "*".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The database URL: the env var named by `database.url_env` if set,
    /// otherwise `database.default_url`.
    pub fn database_url(&self) -> String {
        Self::resolve_env(&self.database.url_env)
            .unwrap_or_else(|_| self.database.default_url.clone())
    }
}
