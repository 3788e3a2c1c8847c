//! Client configuration

use campus_core::RouteTable;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Authentication constants
pub struct AuthConfig;

impl AuthConfig {
    /// Fixed interval between proactive refreshes
    pub const TOKEN_REFRESH_INTERVAL_SECS: u64 = 15 * 60;

    /// Delay before the first refresh of a freshly established session
    pub const INITIAL_REFRESH_DELAY_SECS: u64 = 5;

    /// Where unauthenticated navigations are sent
    pub const LOGIN_PATH: &'static str = "/login";

    /// Where navigations without the required role are sent
    pub const UNAUTHORIZED_PATH: &'static str = "/unauthorized";

    /// Environment variable prefix for configuration overrides
    pub const ENV_PREFIX: &'static str = "CAMPUS";
}

/// Top-level client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampusConfig {
    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Session lifecycle settings
    #[serde(default)]
    pub session: SessionConfig,
    /// Route authorization settings
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Override for the state directory holding the durable session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
}

/// REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL all API paths are relative to
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Session lifecycle configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds between scheduled refreshes
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Seconds before the first refresh after a session is established
    #[serde(default = "default_initial_refresh_delay")]
    pub initial_refresh_delay_secs: u64,
    /// Force logout after this many transient refresh failures in a row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_consecutive_failures: Option<u32>,
}

/// Route authorization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_unauthorized_path")]
    pub unauthorized_path: String,
    /// Protected routes; paths without a rule are public
    #[serde(default = "RouteTable::platform_defaults")]
    pub rules: RouteTable,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

const fn default_timeout() -> u64 {
    30
}

const fn default_refresh_interval() -> u64 {
    AuthConfig::TOKEN_REFRESH_INTERVAL_SECS
}

const fn default_initial_refresh_delay() -> u64 {
    AuthConfig::INITIAL_REFRESH_DELAY_SECS
}

fn default_login_path() -> String {
    AuthConfig::LOGIN_PATH.to_string()
}

fn default_unauthorized_path() -> String {
    AuthConfig::UNAUTHORIZED_PATH.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ApiConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            initial_refresh_delay_secs: default_initial_refresh_delay(),
            max_consecutive_failures: None,
        }
    }
}

impl SessionConfig {
    /// Interval between refreshes, never shorter than one second
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub const fn initial_refresh_delay(&self) -> Duration {
        Duration::from_secs(self.initial_refresh_delay_secs)
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            unauthorized_path: default_unauthorized_path(),
            rules: RouteTable::platform_defaults(),
        }
    }
}

impl CampusConfig {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// Environment variables use the `CAMPUS__` prefix with `__` as the
    /// section separator, e.g. `CAMPUS__API__BASE_URL`.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Start with defaults
        builder = builder.add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }

        // Environment variables override file settings
        builder = builder.add_source(
            Environment::with_prefix(AuthConfig::ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::Role;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CampusConfig::default();
        assert_eq!(config.session.refresh_interval(), Duration::from_secs(900));
        assert_eq!(config.session.initial_refresh_delay(), Duration::from_secs(5));
        assert_eq!(config.session.max_consecutive_failures, None);
        assert_eq!(config.routing.login_path, "/login");
        assert!(!config.routing.rules.is_empty());
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let session = SessionConfig {
            refresh_interval_secs: 0,
            ..SessionConfig::default()
        };
        assert_eq!(session.refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[api]
base_url = "https://lms.example.edu/api"

[session]
refresh_interval_secs = 600
max_consecutive_failures = 3

[[routing.rules]]
pattern = "/admin/*"
roles = ["admin"]
"#
        )
        .unwrap();

        let config = CampusConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.api.base_url, "https://lms.example.edu/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.session.refresh_interval_secs, 600);
        assert_eq!(config.session.initial_refresh_delay_secs, 5);
        assert_eq!(config.session.max_consecutive_failures, Some(3));

        let rules = config.routing.rules.rules();
        assert_eq!(rules[0].pattern.as_str(), "/admin/*");
        assert!(rules[0].roles.contains(Role::Admin));
    }
}
