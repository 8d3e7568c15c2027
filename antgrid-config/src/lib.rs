use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use std::{fs, io};
use thiserror::Error;

// --- Error Type ---
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

// --- Configuration Sections ---

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Accepted `Origin` header values. Empty admits every origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 3001 }

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: Vec::new(),
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// --- Top-Level Config Struct ---

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default = "default_grid_dimension")]
    pub grid_width: i64,
    #[serde(default = "default_grid_dimension")]
    pub grid_height: i64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_max_players")]
    pub max_players: usize,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_rate_limit_window_ms")]
    pub rate_limit_window_ms: u64,
    #[serde(default = "default_max_messages_per_window")]
    pub max_messages_per_window: u32,
    /// Cells per GRID_CHUNK message during initial transfer.
    #[serde(default = "default_grid_chunk_size")]
    pub grid_chunk_size: usize,
    #[serde(default)]
    pub server: ServerSettings,
}

fn default_grid_dimension() -> i64 { 20 }
fn default_tick_interval_ms() -> u64 { 250 }
fn default_max_players() -> usize { 10 }
fn default_heartbeat_interval_ms() -> u64 { 10_000 }
fn default_rate_limit_window_ms() -> u64 { 1_000 }
fn default_max_messages_per_window() -> u32 { 30 }
fn default_grid_chunk_size() -> usize { 1_000 }

impl Default for Config {
    fn default() -> Self {
        Self {
            grid_width: default_grid_dimension(),
            grid_height: default_grid_dimension(),
            tick_interval_ms: default_tick_interval_ms(),
            max_players: default_max_players(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            rate_limit_window_ms: default_rate_limit_window_ms(),
            max_messages_per_window: default_max_messages_per_window(),
            grid_chunk_size: default_grid_chunk_size(),
            server: ServerSettings::default(),
        }
    }
}

// --- Helper Methods ---

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width <= 0 || self.grid_height <= 0 {
            return Err(ConfigError::Validation(format!(
                "grid dimensions must be positive, got {}x{}",
                self.grid_width, self.grid_height
            )));
        }
        if self.grid_width > i64::from(i32::MAX) || self.grid_height > i64::from(i32::MAX) {
            return Err(ConfigError::Validation("grid dimensions exceed the coordinate range".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Validation("tick_interval_ms cannot be zero".to_string()));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Validation("heartbeat_interval_ms cannot be zero".to_string()));
        }
        if self.rate_limit_window_ms == 0 {
            return Err(ConfigError::Validation("rate_limit_window_ms cannot be zero".to_string()));
        }
        if self.max_players == 0 {
            return Err(ConfigError::Validation("max_players cannot be zero".to_string()));
        }
        if self.max_messages_per_window == 0 {
            return Err(ConfigError::Validation("max_messages_per_window cannot be zero".to_string()));
        }
        if self.grid_chunk_size == 0 {
            return Err(ConfigError::Validation("grid_chunk_size cannot be zero".to_string()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }
}

// --- Loading Function ---

/// Reads and validates a config file. `.toml` files are parsed as TOML,
/// anything else as JSON.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("toml"));

    let config: Config = if is_toml {
        toml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };

    config.validate()?;
    Ok(config)
}
