//! Configuration resolution for coolsight-op
//!
//! Settings resolve CLI → ENV → TOML → default, using the shared helpers in
//! `coolsight_common::config`.

use std::path::Path;

use coolsight_common::config::{self, TomlConfig};
use coolsight_common::Result;
use tracing::info;

/// Default HTTP listen port
pub const DEFAULT_PORT: u16 = 5810;

/// Default failure probability of the simulated device channel
pub const DEFAULT_TRANSMIT_FAILURE_RATE: f64 = 0.1;

/// CLI-provided overrides (parsed in main)
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub device_endpoint: Option<String>,
    pub classifier_endpoint: Option<String>,
    pub simulated: bool,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    /// Remote device endpoint; None means the simulated channel is used
    pub device_endpoint: Option<String>,
    /// Inference provider endpoint; None means the canned classifier is used
    pub classifier_endpoint: Option<String>,
    pub transmit_failure_rate: f64,
    /// Force simulated classifier and device channel even when endpoints are
    /// configured
    pub simulated: bool,
}

impl ServiceConfig {
    /// Resolve the full configuration from CLI overrides and an optional
    /// explicit TOML path
    pub fn resolve(cli: CliOverrides, config_path: Option<&Path>) -> Result<Self> {
        let toml: TomlConfig = config::load_toml_config(config_path)?;

        let port = config::resolve_port(cli.port, "COOLSIGHT_PORT", toml.port, DEFAULT_PORT);

        let device_endpoint = config::resolve_string(
            cli.device_endpoint.as_deref(),
            "COOLSIGHT_DEVICE_ENDPOINT",
            toml.device_endpoint.as_deref(),
            None,
        );

        let classifier_endpoint = config::resolve_string(
            cli.classifier_endpoint.as_deref(),
            "COOLSIGHT_CLASSIFIER_ENDPOINT",
            toml.classifier_endpoint.as_deref(),
            None,
        );

        let transmit_failure_rate = toml
            .transmit_failure_rate
            .unwrap_or(DEFAULT_TRANSMIT_FAILURE_RATE)
            .clamp(0.0, 1.0);

        let resolved = Self {
            port,
            device_endpoint,
            classifier_endpoint,
            transmit_failure_rate,
            simulated: cli.simulated,
        };

        info!(
            port = resolved.port,
            simulated = resolved.simulated,
            device_endpoint = resolved.device_endpoint.as_deref().unwrap_or("(simulated)"),
            classifier_endpoint = resolved
                .classifier_endpoint
                .as_deref()
                .unwrap_or("(canned)"),
            "Configuration resolved"
        );

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_cli_or_toml() {
        let config = ServiceConfig::resolve(
            CliOverrides::default(),
            Some(Path::new("/nonexistent/coolsight-op.toml")),
        )
        .unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.device_endpoint.is_none());
        assert!(config.classifier_endpoint.is_none());
        assert_eq!(config.transmit_failure_rate, DEFAULT_TRANSMIT_FAILURE_RATE);
        assert!(!config.simulated);
    }

    #[test]
    fn test_cli_overrides_win() {
        let cli = CliOverrides {
            port: Some(6100),
            device_endpoint: Some("http://device.local/settings".to_string()),
            classifier_endpoint: None,
            simulated: true,
        };
        let config = ServiceConfig::resolve(
            cli,
            Some(Path::new("/nonexistent/coolsight-op.toml")),
        )
        .unwrap();

        assert_eq!(config.port, 6100);
        assert_eq!(
            config.device_endpoint.as_deref(),
            Some("http://device.local/settings")
        );
        assert!(config.simulated);
    }
}
