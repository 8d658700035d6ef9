//! Configuration for the license registry.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! There is no global configuration: the server binary calls
//! [`RegistryConfig::load`] once at startup and hands the pieces it needs to
//! the components it builds.
//!
//! # Environment Variables
//!
//! - `LICREG_SERVER_HOST` - Server bind address
//! - `LICREG_SERVER_PORT` (or `PORT`) - Server port
//! - `LICREG_DATABASE_URL` (or `DATABASE_URL`) - `sqlite:` or `postgres:` URL
//! - `LICREG_DATABASE_MAX_CONNECTIONS` - Pool size
//! - `LICREG_CORS_ORIGIN` (or `CORS_ORIGIN`) - Allowed CORS origin, `*` for any
//! - `LICREG_LICENSE_KEY_PREFIX` - Prefix for generated keys
//! - `LICREG_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use std::env;
use std::str::FromStr;
use std::sync::LazyLock;

use config::Config;
use regex::Regex;
use serde::Deserialize;

use crate::errors::{LicenseError, LicenseResult};

static KEY_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{1,16}$").expect("key prefix pattern is valid"));

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// License key configuration
    pub license: LicenseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL; the scheme selects the backend
    pub url: String,
    /// Maximum number of pooled connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://licreg.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origin, or `*` to allow any origin
    pub origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origin: "*".to_string(),
        }
    }
}

/// License key generation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    /// Prefix for generated keys (e.g., "SKU" -> "SKU-MONTH-1A2B3C4D")
    pub key_prefix: String,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            key_prefix: "SKU".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// The configured level as a `tracing` level.
    pub fn tracing_level(&self) -> LicenseResult<tracing::Level> {
        tracing::Level::from_str(&self.level).map_err(|_| {
            LicenseError::ConfigError(format!(
                "logging.level must be one of: trace, debug, info, warn, error. Got '{}'",
                self.level
            ))
        })
    }
}

fn config_err(e: config::ConfigError) -> LicenseError {
    LicenseError::ConfigError(e.to_string())
}

/// First non-empty value among the given environment variables.
fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

/// Like [`env_first`] for integer settings. A value that isn't an integer
/// is an error rather than being skipped.
fn env_integer(names: &[&str]) -> LicenseResult<Option<i64>> {
    let found = names.iter().find_map(|name| {
        env::var(name)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| (*name, value))
    });

    let Some((name, value)) = found else {
        return Ok(None);
    };

    value.trim().parse::<i64>().map(Some).map_err(|_| {
        LicenseError::ConfigError(format!("{name} must be an integer, got '{value}'"))
    })
}

impl RegistryConfig {
    /// Load configuration from `config.toml` (if present) and the environment,
    /// then validate it.
    pub fn load() -> LicenseResult<Self> {
        Self::load_from("config")
    }

    /// Same as [`RegistryConfig::load`] but reading the optional file from
    /// `file` (extension inferred by the `config` crate).
    pub fn load_from(file: &str) -> LicenseResult<Self> {
        let defaults = Self::default();
        let port = env_integer(&["LICREG_SERVER_PORT", "PORT"])?;
        let max_connections = env_integer(&["LICREG_DATABASE_MAX_CONNECTIONS"])?;

        let settings = Config::builder()
            .set_default("server.host", defaults.server.host)
            .map_err(config_err)?
            .set_default("server.port", i64::from(defaults.server.port))
            .map_err(config_err)?
            .set_default("database.url", defaults.database.url)
            .map_err(config_err)?
            .set_default(
                "database.max_connections",
                i64::from(defaults.database.max_connections),
            )
            .map_err(config_err)?
            .set_default("cors.origin", defaults.cors.origin)
            .map_err(config_err)?
            .set_default("license.key_prefix", defaults.license.key_prefix)
            .map_err(config_err)?
            .set_default("logging.level", defaults.logging.level)
            .map_err(config_err)?
            .add_source(config::File::with_name(file).required(false))
            .set_override_option("server.host", env_first(&["LICREG_SERVER_HOST"]))
            .map_err(config_err)?
            .set_override_option("server.port", port)
            .map_err(config_err)?
            .set_override_option(
                "database.url",
                env_first(&["LICREG_DATABASE_URL", "DATABASE_URL"]),
            )
            .map_err(config_err)?
            .set_override_option("database.max_connections", max_connections)
            .map_err(config_err)?
            .set_override_option(
                "cors.origin",
                env_first(&["LICREG_CORS_ORIGIN", "CORS_ORIGIN"]),
            )
            .map_err(config_err)?
            .set_override_option(
                "license.key_prefix",
                env_first(&["LICREG_LICENSE_KEY_PREFIX"]),
            )
            .map_err(config_err)?
            .set_override_option("logging.level", env_first(&["LICREG_LOG_LEVEL"]))
            .map_err(config_err)?
            .build()
            .map_err(|e| LicenseError::ConfigError(format!("failed to build config: {e}")))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| LicenseError::ConfigError(format!("failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> LicenseResult<()> {
        if self.server.port == 0 {
            return Err(LicenseError::ConfigError(
                "server.port must be greater than 0".to_string(),
            ));
        }

        let url = self.database.url.as_str();
        if !(url.starts_with("sqlite:")
            || url.starts_with("postgres:")
            || url.starts_with("postgresql:"))
        {
            return Err(LicenseError::ConfigError(format!(
                "database.url must start with 'sqlite:' or 'postgres:', got '{url}'"
            )));
        }

        if self.database.max_connections == 0 {
            return Err(LicenseError::ConfigError(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        if self.cors.origin.trim().is_empty() {
            return Err(LicenseError::ConfigError(
                "cors.origin cannot be empty (use '*' to allow any origin)".to_string(),
            ));
        }

        if !KEY_PREFIX_RE.is_match(&self.license.key_prefix) {
            return Err(LicenseError::ConfigError(format!(
                "license.key_prefix must be 1-16 alphanumeric characters, got '{}'",
                self.license.key_prefix
            )));
        }

        self.logging.tracing_level()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RegistryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.cors.origin, "*");
        assert_eq!(config.license.key_prefix, "SKU");
    }

    #[test]
    fn rejects_unknown_database_scheme() {
        let mut config = RegistryConfig::default();
        config.database.url = "mysql://localhost/licenses".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LicenseError::ConfigError(_)));
    }

    #[test]
    fn accepts_postgresql_scheme() {
        let mut config = RegistryConfig::default();
        config.database.url = "postgresql://localhost/licenses".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_key_prefix() {
        let mut config = RegistryConfig::default();
        config.license.key_prefix = "SK-U".to_string();
        assert!(config.validate().is_err());

        config.license.key_prefix = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = RegistryConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let logging = LoggingConfig {
            level: "DEBUG".to_string(),
        };
        assert_eq!(logging.tracing_level().unwrap(), tracing::Level::DEBUG);
    }
}
