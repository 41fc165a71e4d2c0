use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub paging: PagingConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// REST backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Backend root; requests go to `{base_url}/api/...`
    pub base_url: String,
    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Retry attempts for GET requests (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// First backoff delay in milliseconds, doubled per attempt (default: 1000)
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    /// Backoff ceiling in milliseconds (default: 8000)
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_backoff() -> u64 {
    1000
}

fn default_max_backoff() -> u64 {
    8000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    pub default_page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory for the persisted login and log files
    pub state: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to a file under the state directory instead of stderr
    #[serde(default)]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
        }
    }
}

impl Config {
    /// Path to the project-local config file
    pub fn local_config_path() -> PathBuf {
        PathBuf::from(".fleetdesk/config.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so fleetdesk works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        // User config in ~/.config/fleetdesk/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("fleetdesk").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        let local_config = Self::local_config_path();
        if local_config.exists() {
            builder = builder.add_source(config::File::from(local_config));
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::from(PathBuf::from(path)));
        }

        // Environment variables with FLEETDESK_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("FLEETDESK")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save config to .fleetdesk/config.toml
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::local_config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(config_path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    /// Get absolute path to state directory
    pub fn state_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.paths.state);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            paging: PagingConfig {
                default_page_size: 10,
            },
            paths: PathsConfig {
                state: ".fleetdesk".to_string(), // Relative to cwd
            },
            logging: LoggingConfig::default(),
        }
    }
}
