//! Configuration management for the member registry.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "member-registry";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "members.db";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "MEMBER_REGISTRY_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `MEMBER_REGISTRY_`, sections
///    separated by `__`, e.g. `MEMBER_REGISTRY_SERVER__PORT`)
/// 2. TOML config file at `~/.config/member-registry/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Page presentation configuration.
    pub site: SiteConfig,
    /// Session cookie configuration.
    pub session: SessionConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address to listen on.
    pub host: String,
    /// TCP port to listen on.
    pub port: u16,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/member-registry/members.db`
    pub database_path: Option<PathBuf>,
}

/// Page presentation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Title shown on every page.
    pub title: String,
}

/// Session cookie configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the session cookie.
    pub cookie_name: String,
    /// Only send the cookie over HTTPS.
    pub secure: bool,
    /// Minutes of inactivity before a session expires.
    pub idle_minutes: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Simple Member Registry".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "memreg_session".to_string(),
            secure: false,
            idle_minutes: 60,
        }
    }
}

impl Config {
    /// Load configuration, reading `config_path` or the default file.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.parse::<IpAddr>().is_err() {
            return Err(Error::ConfigValidation {
                message: format!("server.host is not an IP address: {}", self.server.host),
            });
        }

        if self.server.port == 0 {
            return Err(Error::ConfigValidation {
                message: "server.port must be greater than 0".to_string(),
            });
        }

        if self.site.title.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "site.title must not be empty".to_string(),
            });
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "session.cookie_name must not be empty".to_string(),
            });
        }

        if self.session.idle_minutes == 0 {
            return Err(Error::ConfigValidation {
                message: "session.idle_minutes must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| Error::ConfigValidation {
                message: format!("server.host is not an IP address: {}", self.server.host),
            })?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// Get the session idle timeout as a Duration.
    #[must_use]
    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(u64::from(self.session.idle_minutes) * 60)
    }
}
