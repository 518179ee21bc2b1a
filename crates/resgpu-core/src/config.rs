//! Configuration types for resgpu

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default plugin name, also the key of this plugin in engine info resources
pub const DEFAULT_PLUGIN_NAME: &str = "gpu";

/// Main plugin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Plugin name
    pub name: String,
    /// Store configuration
    pub store: StoreConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_PLUGIN_NAME.to_string(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PluginConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::ResgpuError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::ResgpuError::Config(format!("Failed to read config file: {}", e))
        })?;
        toml::from_str(&content)
            .map_err(|e| crate::ResgpuError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Key prefix under which node records live
    pub prefix: String,
    /// Store backend
    pub backend: StoreBackend,
    /// Path of the redb database used by the file backend
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            prefix: "/resource/gpu".to_string(),
            backend: StoreBackend::File,
            path: PathBuf::from("/var/lib/resgpu/store.redb"),
        }
    }
}

/// Store backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local map, lost on exit
    Memory,
    /// redb database file on disk
    File,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or text)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plugin_config() {
        let config = PluginConfig::default();
        assert_eq!(config.name, "gpu");
        assert_eq!(config.store.prefix, "/resource/gpu");
        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_plugin_config_parse() {
        let toml_str = r#"
name = "gpu"

[store]
prefix = "/eru/gpu"
backend = "memory"

[logging]
level = "debug"
format = "json"
"#;
        let config: PluginConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store.prefix, "/eru/gpu");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.path, PathBuf::from("/var/lib/resgpu/store.redb"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_plugin_config_partial() {
        let config: PluginConfig = toml::from_str("[logging]\nlevel = \"warn\"\n").unwrap();
        assert_eq!(config.name, DEFAULT_PLUGIN_NAME);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_plugin_config_missing_file() {
        let result = PluginConfig::from_file(std::path::Path::new("/nonexistent/gpu.toml"));
        assert!(matches!(result, Err(crate::ResgpuError::Config(_))));
    }
}
