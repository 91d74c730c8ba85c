//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: default_bind_address(), port: default_http_port() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Minimum wall-clock interval between transition-producing evaluations
    /// for a given vehicle
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Maximum tolerated clock skew for event timestamps ahead of
    /// processing time
    #[serde(default = "default_max_future_skew_secs")]
    pub max_future_skew_secs: i64,
}

fn default_debounce_ms() -> u64 {
    2000
}

fn default_max_future_skew_secs() -> i64 {
    5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            max_future_skew_secs: default_max_future_skew_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZonesConfig {
    /// Path to the zone definitions JSON document
    #[serde(default = "default_zones_file")]
    pub file: String,
}

fn default_zones_file() -> String {
    "config/zones.json".to_string()
}

impl Default for ZonesConfig {
    fn default() -> Self {
        Self { file: default_zones_file() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
}

fn default_metrics_interval_secs() -> u64 {
    10
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval_secs() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site identifier used as a metrics label
    #[serde(default = "default_site_id")]
    pub id: String,
}

fn default_site_id() -> String {
    "geofence".to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { id: default_site_id() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub zones: ZonesConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    bind_address: String,
    http_port: u16,
    debounce_ms: u64,
    max_future_skew_secs: i64,
    zones_file: String,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_id: default_site_id(),
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            debounce_ms: default_debounce_ms(),
            max_future_skew_secs: default_max_future_skew_secs(),
            zones_file: default_zones_file(),
            metrics_interval_secs: default_metrics_interval_secs(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine the config file path: an explicit `--config` argument wins,
    /// then the CONFIG_FILE environment variable, then the default
    pub fn resolve_config_path(cli_override: Option<&str>) -> String {
        if let Some(path) = cli_override {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            site_id: toml_config.site.id,
            bind_address: toml_config.server.bind_address,
            http_port: toml_config.server.port,
            debounce_ms: toml_config.engine.debounce_ms,
            max_future_skew_secs: toml_config.engine.max_future_skew_secs,
            zones_file: toml_config.zones.file,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries the TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn debounce_ms(&self) -> u64 {
        self.debounce_ms
    }

    pub fn max_future_skew_secs(&self) -> i64 {
        self.max_future_skew_secs
    }

    pub fn zones_file(&self) -> &str {
        &self.zones_file
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set the debounce window
    #[cfg(test)]
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Builder method for tests to set the future-timestamp skew tolerance
    #[cfg(test)]
    pub fn with_max_future_skew_secs(mut self, secs: i64) -> Self {
        self.max_future_skew_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "0.0.0.0");
        assert_eq!(config.http_port(), 8080);
        assert_eq!(config.debounce_ms(), 2000);
        assert_eq!(config.max_future_skew_secs(), 5);
        assert_eq!(config.zones_file(), "config/zones.json");
        assert_eq!(config.metrics_interval_secs(), 10);
        assert_eq!(config.site_id(), "geofence");
    }

    #[test]
    fn test_resolve_config_path_override_wins() {
        assert_eq!(Config::resolve_config_path(Some("config/prod.toml")), "config/prod.toml");
    }

    // Env fallback and default share one test so CONFIG_FILE manipulation
    // does not race other tests reading the environment
    #[test]
    fn test_resolve_config_path_env_then_default() {
        env::set_var("CONFIG_FILE", "config/staging.toml");
        assert_eq!(Config::resolve_config_path(None), "config/staging.toml");
        env::remove_var("CONFIG_FILE");
        assert_eq!(Config::resolve_config_path(None), "config/dev.toml");
    }

    #[test]
    fn test_partial_toml_uses_section_defaults() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            [engine]
            debounce_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(toml_config.engine.debounce_ms, 500);
        assert_eq!(toml_config.engine.max_future_skew_secs, 5);
        assert_eq!(toml_config.server.port, 8080);
        assert_eq!(toml_config.zones.file, "config/zones.json");
    }
}
