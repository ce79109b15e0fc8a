use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SonarError};

/// Name of the configuration file looked up in the user config directory.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Name of the application directory inside the user config directory.
pub const CONFIG_DIR: &str = "sonar-mcp";

pub const ENV_URL: &str = "SONARQUBE_URL";
pub const ENV_TOKEN: &str = "SONARQUBE_TOKEN";
pub const ENV_USERNAME: &str = "SONARQUBE_USERNAME";
pub const ENV_PASSWORD: &str = "SONARQUBE_PASSWORD";

/// Connection settings for the SonarQube server.
///
/// Every field has a default, so a config file only needs to name the
/// values it overrides.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SonarConfig {
    /// Base URL of the SonarQube server, without a trailing slash.
    pub base_url: String,
    /// User token. Takes precedence over username/password when non-empty.
    pub token: String,
    pub username: String,
    pub password: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Upper bound on pooled idle connections across all hosts.
    pub max_idle_connections: usize,
    /// Upper bound on pooled idle connections to a single host.
    pub max_idle_connections_per_host: usize,
    /// Redirects followed before a request fails.
    pub max_redirects: u32,
}

impl Default for SonarConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8088".to_string(),
            token: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_secs: 30,
            max_idle_connections: 20,
            max_idle_connections_per_host: 5,
            max_redirects: 10,
        }
    }
}

impl fmt::Debug for SonarConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(s: &str) -> &str {
            if s.is_empty() {
                ""
            } else {
                "<redacted>"
            }
        }
        f.debug_struct("SonarConfig")
            .field("base_url", &self.base_url)
            .field("token", &redact(&self.token))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_idle_connections", &self.max_idle_connections)
            .field(
                "max_idle_connections_per_host",
                &self.max_idle_connections_per_host,
            )
            .field("max_redirects", &self.max_redirects)
            .finish()
    }
}

impl SonarConfig {
    /// Overlays values found through `lookup` (normally the process
    /// environment). Unset variables leave the current value untouched.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL) {
            self.base_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.token = token;
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            self.username = username;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.password = password;
        }
    }

    /// Normalizes and checks the configuration.
    pub fn validate(mut self) -> Result<Self> {
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if self.base_url.is_empty() {
            return Err(SonarError::Config {
                message: "base_url must not be empty".to_string(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(SonarError::Config {
                message: "timeout_secs must be greater than zero".to_string(),
            });
        }
        Ok(self)
    }
}

/// Returns the default config file location, `<config dir>/sonar-mcp/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR).join(CONFIG_FILENAME))
}

/// Reads a TOML config file.
pub fn load_config_file(path: &Path) -> Result<SonarConfig> {
    let contents = fs::read_to_string(path).map_err(|e| SonarError::Config {
        message: format!("failed to read config file '{}': {}", path.display(), e),
    })?;

    toml::from_str(&contents).map_err(|e| SonarError::Config {
        message: format!("failed to parse config file '{}': {}", path.display(), e),
    })
}

/// Resolves the effective configuration.
///
/// Starts from the defaults, overlays the explicit config file (or the
/// default one if it exists), then the process environment.
pub fn load_config(explicit: Option<&Path>) -> Result<SonarConfig> {
    let config = match explicit {
        Some(path) => load_config_file(path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => load_config_file(&path)?,
            _ => SonarConfig::default(),
        },
    };

    let mut config = config;
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()
}
