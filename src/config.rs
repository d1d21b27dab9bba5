// ABOUTME: Configuration module for the showtell application
// ABOUTME: Provides configuration defaults, environment overrides and derived server options

use crate::parser::ParserRegistry;
use crate::resources::RevealAssets;
use crate::server::ServerOptions;
use crate::watch::WatchConfig;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Global configuration for the application
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub address: String,
    pub presentation_file: PathBuf,
    pub slide_dir: PathBuf,
    pub reveal_dir: PathBuf,
    pub custom_assets_dir: Option<PathBuf>,
    pub debounce_ms: u64,
    pub heartbeat_secs: u64,
    pub shutdown_timeout_secs: u64,
    pub bus_queue_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: ":8080".to_string(),
            presentation_file: PathBuf::from("presentation.yaml"),
            slide_dir: PathBuf::from("slides"),
            reveal_dir: PathBuf::from("reveal"),
            custom_assets_dir: None,
            debounce_ms: 500,
            heartbeat_secs: 10,
            shutdown_timeout_secs: 15,
            bus_queue_size: 100,
        }
    }
}

impl Config {
    /// Create a new configuration instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup, falling back to defaults
    /// for missing or unparsable values
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let number = |key: &str, default: u64| {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };

        Self {
            address: lookup("SAT_ADDR").unwrap_or(defaults.address),
            presentation_file: lookup("SAT_PRESENTATION")
                .map(PathBuf::from)
                .unwrap_or(defaults.presentation_file),
            slide_dir: lookup("SAT_SLIDES")
                .map(PathBuf::from)
                .unwrap_or(defaults.slide_dir),
            reveal_dir: lookup("SAT_REVEAL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.reveal_dir),
            custom_assets_dir: lookup("SAT_ASSETS").map(PathBuf::from),
            debounce_ms: number("SAT_DEBOUNCE_MS", defaults.debounce_ms),
            heartbeat_secs: number("SAT_HEARTBEAT_SECS", defaults.heartbeat_secs).max(1),
            shutdown_timeout_secs: number(
                "SAT_SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout_secs,
            ),
            bus_queue_size: number("SAT_BUS_QUEUE_SIZE", defaults.bus_queue_size as u64).max(1)
                as usize,
        }
    }

    /// Get server options with the timings and queue size from this config
    pub fn server_options(&self, registry: ParserRegistry, assets: RevealAssets) -> ServerOptions {
        ServerOptions {
            registry,
            assets,
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
            bus_queue_size: self.bus_queue_size,
        }
    }

    /// Get a watch configuration for the slide folder
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            slide_root: self.slide_dir.clone(),
            debounce_ms: self.debounce_ms,
        }
    }
}
