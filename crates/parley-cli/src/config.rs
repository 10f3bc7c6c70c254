//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use parley_session::RetryConfig;

/// Configuration for parley
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Orchestrator base URL
    pub orchestrator_url: Option<String>,
    /// Conversation backend base URL (defaults to the orchestrator)
    pub backend_url: Option<String>,
    /// Agent endpoint to talk to
    pub agent_url: Option<String>,
    /// Agent identifier sent with each turn
    pub agent_id: Option<String>,
    /// Whether turns start plan-mode negotiations by default
    pub plan_mode: Option<bool>,
    /// Retry policy for opening streams
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Stream retry settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        let defaults = RetryConfig::default();
        RetryConfig {
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            initial_delay: self
                .initial_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_delay),
            max_delay: self
                .max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
            backoff_multiplier: defaults.backoff_multiplier,
        }
    }
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parley")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        // Check for PARLEY_CONFIG_PATH env var first
        if let Ok(path) = std::env::var("PARLEY_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse config file: {}", e);
                Self::default()
            }),
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            orchestrator_url: Some(DEFAULT_ORCHESTRATOR.to_string()),
            backend_url: None,
            agent_url: None,
            agent_id: None,
            plan_mode: Some(false),
            retry: RetrySettings::default(),
        };

        default_config.save()?;
        Ok(path)
    }
}

pub const DEFAULT_ORCHESTRATOR: &str = "http://localhost:3001";

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# parley configuration file
# Place at ~/.config/parley/config.toml (Linux/Mac) or %APPDATA%\parley\config.toml (Windows)

# Orchestrator that relays turns to agents
orchestrator_url = "http://localhost:3001"

# Conversation backend, if it is not the orchestrator
# backend_url = "http://localhost:3000"

# Agent to talk to (optional - the orchestrator may pick one)
# agent_url = "http://localhost:9999"
# agent_id = "reddit-analyst"

# Start every turn in plan mode
plan_mode = false

[retry]
# max_retries = 3
# initial_delay_ms = 1000
# max_delay_ms = 30000
"#
}
