//! Configuration loading and resolution helpers
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration file contents
///
/// All fields are optional; missing fields fall back to the next resolution
/// tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP listen port for the service
    pub port: Option<u16>,
    /// Remote device endpoint URL (cooling-unit control channel)
    pub device_endpoint: Option<String>,
    /// Inference provider endpoint URL (image classification)
    pub classifier_endpoint: Option<String>,
    /// Transmission failure probability for the simulated device channel
    pub transmit_failure_rate: Option<f64>,
}

/// Load the TOML config from an explicit path, or from the default location
///
/// A missing file is not an error; it yields the empty config so the lower
/// resolution tiers apply.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) => p,
            None => return Ok(TomlConfig::default()),
        },
    };

    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write the TOML config back to disk, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Default configuration file path for the platform
///
/// Linux: ~/.config/coolsight/coolsight-op.toml
/// macOS/Windows: platform config dir + coolsight/coolsight-op.toml
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("coolsight").join("coolsight-op.toml"))
}

/// Resolve a string setting through the CLI → ENV → TOML → default tiers
pub fn resolve_string(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml_value: Option<&str>,
    default: Option<&str>,
) -> Option<String> {
    if let Some(value) = cli_arg {
        return Some(value.to_string());
    }
    if let Ok(value) = std::env::var(env_var_name) {
        if !value.trim().is_empty() {
            return Some(value);
        }
    }
    if let Some(value) = toml_value {
        return Some(value.to_string());
    }
    default.map(|d| d.to_string())
}

/// Resolve the listen port through the CLI → ENV → TOML → default tiers
pub fn resolve_port(
    cli_arg: Option<u16>,
    env_var_name: &str,
    toml_value: Option<u16>,
    default: u16,
) -> u16 {
    if let Some(port) = cli_arg {
        return port;
    }
    if let Ok(value) = std::env::var(env_var_name) {
        if let Ok(port) = value.parse() {
            return port;
        }
        tracing::warn!(
            "Ignoring unparseable {} value: {:?}",
            env_var_name,
            value
        );
    }
    toml_value.unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_toml_config(Some(Path::new("/nonexistent/coolsight-op.toml"))).unwrap();
        assert!(config.port.is_none());
        assert!(config.device_endpoint.is_none());
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coolsight-op.toml");

        let config = TomlConfig {
            port: Some(5810),
            device_endpoint: Some("http://192.168.1.40:8080/settings".to_string()),
            classifier_endpoint: None,
            transmit_failure_rate: Some(0.1),
        };
        write_toml_config(&config, &path).unwrap();

        let loaded = load_toml_config(Some(&path)).unwrap();
        assert_eq!(loaded.port, Some(5810));
        assert_eq!(
            loaded.device_endpoint.as_deref(),
            Some("http://192.168.1.40:8080/settings")
        );
        assert_eq!(loaded.transmit_failure_rate, Some(0.1));
    }

    #[test]
    fn test_cli_outranks_toml() {
        let port = resolve_port(Some(6000), "COOLSIGHT_TEST_UNSET_PORT", Some(5810), 5800);
        assert_eq!(port, 6000);

        let port = resolve_port(None, "COOLSIGHT_TEST_UNSET_PORT", Some(5810), 5800);
        assert_eq!(port, 5810);

        let port = resolve_port(None, "COOLSIGHT_TEST_UNSET_PORT", None, 5800);
        assert_eq!(port, 5800);
    }
}
