// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use config::{Config as ConfigFile, File, Environment};

/// Backend host used when nothing else is configured
pub const DEFAULT_BACKEND_URL: &str = "https://replier.elcarainternal.lol";

/// Central configuration for the web server and its clients
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub web_server_addr: String,
    /// Origin the site is served from; handoff messages never leave it
    pub site_origin: String,
    pub backend_url: String,
    pub sign_in_url: String,

    pub identity: IdentityConfig,
    pub extension: ExtensionConfig,
    pub dashboard: DashboardConfig,

    // Static file serving configuration
    pub static_files: StaticFilesConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub session_cookie: String,
    /// Secret the identity provider signs session cookies with
    pub session_secret: String,
    /// Secret shared with the backend for bearer tokens
    pub token_secret: String,
    pub token_ttl_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtensionConfig {
    pub handoff_timeout_ms: u64,
    pub heartbeat_interval_secs: u64,
    pub heartbeat_timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub usage_poll_interval_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaticFilesConfig {
    pub path: String,
    pub index: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_server_addr: "127.0.0.1:8081".to_string(),
            site_origin: "http://localhost:8081".to_string(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            sign_in_url: "/sign-in".to_string(),

            identity: IdentityConfig::default(),
            extension: ExtensionConfig::default(),
            dashboard: DashboardConfig::default(),

            static_files: StaticFilesConfig {
                path: "./static".to_string(),
                index: "index.html".to_string(),
            },
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            session_cookie: "__session".to_string(),
            session_secret: "dev_session_secret".to_string(),
            token_secret: "dev_token_secret".to_string(),
            token_ttl_secs: 60,
        }
    }
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            handoff_timeout_ms: 10_000,
            heartbeat_interval_secs: 5,
            heartbeat_timeout_secs: 30,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            usage_poll_interval_ms: 10_000,
        }
    }
}

impl IdentityConfig {
    /// Names of the secrets still set to their built-in development values
    pub fn default_secrets(&self) -> Vec<&'static str> {
        let defaults = Self::default();
        let mut found = Vec::new();
        if self.session_secret == defaults.session_secret {
            found.push("session_secret");
        }
        if self.token_secret == defaults.token_secret {
            found.push("token_secret");
        }
        found
    }
}

impl ExtensionConfig {
    pub fn handoff_timeout(&self) -> Duration {
        Duration::from_millis(self.handoff_timeout_ms)
    }
}

impl DashboardConfig {
    pub fn usage_poll_interval(&self) -> Duration {
        Duration::from_millis(self.usage_poll_interval_ms)
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let defaults = ConfigFile::try_from(&Config::default())?;

        let config = ConfigFile::builder()
            // Start with compiled-in defaults so partial files still deserialize
            .add_source(defaults)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Environment variables with prefix "APP", e.g. APP__BACKEND_URL
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from files, falling back to plain environment variables
    pub fn from_env() -> Self {
        let config = match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");
                Self::from_plain_env()
            }
        };

        for name in config.identity.default_secrets() {
            tracing::warn!(
                "identity.{} is the built-in development value; sessions can be forged until it is changed",
                name
            );
        }

        config
    }

    fn from_plain_env() -> Self {
        let defaults = Self::default();

        let web_server_addr = env::var("WEB_SERVER_ADDR")
            .unwrap_or(defaults.web_server_addr);

        let site_origin = env::var("SITE_ORIGIN")
            .unwrap_or(defaults.site_origin);

        let backend_url = env::var("BACKEND_URL")
            .unwrap_or(defaults.backend_url);

        let sign_in_url = env::var("SIGN_IN_URL")
            .unwrap_or(defaults.sign_in_url);

        let identity = IdentityConfig {
            session_cookie: env::var("SESSION_COOKIE")
                .unwrap_or(defaults.identity.session_cookie),
            session_secret: env::var("SESSION_SECRET")
                .unwrap_or(defaults.identity.session_secret),
            token_secret: env::var("TOKEN_SECRET")
                .unwrap_or(defaults.identity.token_secret),
            token_ttl_secs: parse_env("TOKEN_TTL_SECS", defaults.identity.token_ttl_secs),
        };

        let extension = ExtensionConfig {
            handoff_timeout_ms: parse_env("HANDOFF_TIMEOUT_MS", defaults.extension.handoff_timeout_ms),
            heartbeat_interval_secs: parse_env(
                "EXTENSION_HEARTBEAT_INTERVAL_SECS",
                defaults.extension.heartbeat_interval_secs,
            ),
            heartbeat_timeout_secs: parse_env(
                "EXTENSION_HEARTBEAT_TIMEOUT_SECS",
                defaults.extension.heartbeat_timeout_secs,
            ),
        };

        let dashboard = DashboardConfig {
            usage_poll_interval_ms: parse_env(
                "USAGE_POLL_INTERVAL_MS",
                defaults.dashboard.usage_poll_interval_ms,
            ),
        };

        let static_files = StaticFilesConfig {
            path: env::var("STATIC_FILES_PATH").unwrap_or(defaults.static_files.path),
            index: env::var("STATIC_FILES_INDEX").unwrap_or(defaults.static_files.index),
        };

        Self {
            web_server_addr,
            site_origin,
            backend_url,
            sign_in_url,
            identity,
            extension,
            dashboard,
            static_files,
        }
    }
}

fn parse_env(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(raw) => raw.parse::<u64>().unwrap_or_else(|e| {
            tracing::warn!("Invalid {} value {:?}: {}, using {}", key, raw, e, default);
            default
        }),
        Err(_) => default,
    }
}
