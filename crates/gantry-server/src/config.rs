//! The application configuration record.
//!
//! Loaded once at startup from an optional file plus `GANTRY_`-prefixed
//! environment variables, then treated as immutable. Every section has
//! serde defaults so a missing file yields a workable development setup.

use serde::Deserialize;
use std::path::Path;

use gantry_auth::JwtConfig;
use gantry_crypto::EncryptionConfig;
use gantry_store::{DiskStoreConfig, MemoryStoreConfig, RedisStoreConfig};

use crate::logging::LoggingConfig;
use crate::mock::MockConfig;

/// Application identity and service mount settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// Application name.
    pub name: String,
    /// Human-readable name.
    pub display_name: String,
    /// Longer description.
    pub description: String,
    /// Version string.
    pub version: String,
    /// URL prefix services mount under.
    pub service_path_prefix: String,
    /// Header/query names scanned for the bearer token, in order.
    pub token_keys: Vec<String>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "gantry".to_string(),
            display_name: String::new(),
            description: String::new(),
            version: String::new(),
            service_path_prefix: "/services".to_string(),
            token_keys: vec!["authorization".to_string(), "x-api-key".to_string()],
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Per-request deadline, e.g. `"30s"`; empty disables.
    pub request_timeout: String,
    /// Maximum request body size, e.g. `"4MB"`.
    pub body_limit: String,
    /// Concurrent-request ceiling; 0 disables.
    pub concurrency: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout: "30s".to_string(),
            body_limit: "4MB".to_string(),
            concurrency: 0,
        }
    }
}

/// Token-store backend selection and settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// In-memory backend settings.
    pub memory: MemoryStoreConfig,
    /// Embedded backend settings.
    pub disk: DiskStoreConfig,
    /// Redis backend settings.
    pub redis: RedisStoreConfig,
}

/// Token-store validation gate.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationSection {
    /// Whether phase 2 consults the token store at all.
    pub enabled: bool,
    /// Which backend to use: `memory`, `disk` or `redis`.
    pub cache_strategy: String,
    /// Prefix for every store key, shared with the blacklist.
    pub cache_key_prefix: String,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            enabled: false,
            cache_strategy: "memory".to_string(),
            cache_key_prefix: "gantry:token:".to_string(),
        }
    }
}

/// Token section: JWT settings plus store validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenSection {
    /// JWT issuance/validation settings.
    pub jwt: JwtConfig,
    /// Token-store validation settings.
    pub validation: ValidationSection,
}

/// The full configuration record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GantryConfig {
    /// Application identity and mount settings.
    pub app: AppSection,
    /// HTTP server settings.
    pub server: ServerSection,
    /// Store backend settings.
    pub cache: CacheSection,
    /// JWT and validation settings.
    pub token: TokenSection,
    /// Encryption envelope settings.
    pub encryption: EncryptionConfig,
    /// Mock substitution settings.
    pub mock: MockConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Configuration loading failure.
#[derive(Debug, thiserror::Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(#[from] config::ConfigError);

impl GantryConfig {
    /// Load from an optional file, then overlay `GANTRY_`-prefixed
    /// environment variables (`GANTRY_SERVER__PORT=9090`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("GANTRY").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Service mount prefix, normalised to a single leading slash.
    pub fn service_prefix(&self) -> String {
        let prefix = self.app.service_path_prefix.trim_end_matches('/');
        if prefix.starts_with('/') {
            prefix.to_string()
        } else {
            format!("/{prefix}")
        }
    }
}

/// Parse sizes like `"4MB"`, `"512KB"`, `"10mb"` or bare bytes.
pub fn parse_size(s: &str) -> Option<usize> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(bytes) = s.parse::<usize>() {
        return Some(bytes);
    }

    let unit_start = s.find(|c: char| !c.is_ascii_digit())?;
    let (number, unit) = s.split_at(unit_start);
    let value: usize = number.parse().ok()?;

    match unit.trim().to_ascii_uppercase().as_str() {
        "B" => Some(value),
        "KB" => Some(value * 1024),
        "MB" => Some(value * 1024 * 1024),
        "GB" => Some(value * 1024 * 1024 * 1024),
        _ => None,
    }
}
