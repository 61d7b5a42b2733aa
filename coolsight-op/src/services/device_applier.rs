//! Device application channel
//!
//! **[DEV-APP-010]** Transmits a settings snapshot to the physical cooling
//! unit. The transport is an injected capability so the state machine is
//! testable without a real device; failures are never fatal — every error
//! resolves to an operator-initiated retry or a pipeline reset.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

use coolsight_common::models::CoolerSettings;

const USER_AGENT: &str = "CoolSight/0.1.0 (coolsight-op)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transmission errors
#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Device endpoint error {0}: {1}")]
    Endpoint(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Settings transmission capability
///
/// `Ok(true)` means the device accepted the settings; `Ok(false)` means the
/// device answered cleanly but declined. Retries with identical input are not
/// guaranteed to succeed.
#[async_trait]
pub trait SettingsTransmitter: Send + Sync {
    async fn transmit(&self, settings: &CoolerSettings) -> Result<bool, TransmitError>;
}

/// Device endpoint response body
#[derive(Debug, Deserialize)]
struct TransmitResponse {
    accepted: bool,
}

/// HTTP client for the remote device control channel
pub struct HttpTransmitter {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpTransmitter {
    pub fn new(endpoint: String) -> Result<Self, TransmitError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransmitError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }
}

#[async_trait]
impl SettingsTransmitter for HttpTransmitter {
    async fn transmit(&self, settings: &CoolerSettings) -> Result<bool, TransmitError> {
        tracing::debug!(endpoint = %self.endpoint, "Transmitting settings to device");

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(settings)
            .send()
            .await
            .map_err(|e| TransmitError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TransmitError::Endpoint(status.as_u16(), error_text));
        }

        let body: TransmitResponse = response
            .json()
            .await
            .map_err(|e| TransmitError::Parse(e.to_string()))?;

        tracing::info!(accepted = body.accepted, "Device responded");
        Ok(body.accepted)
    }
}

/// Simulated device channel with a constant failure probability
///
/// Used when no device endpoint is configured. The failure rate and latency
/// are constructor parameters, not ambient randomness.
pub struct SimulatedTransmitter {
    failure_rate: f64,
    latency: Duration,
    rng: Mutex<StdRng>,
}

impl SimulatedTransmitter {
    pub fn new(failure_rate: f64, latency: Duration) -> Self {
        Self::with_seed(failure_rate, latency, rand::random())
    }

    pub fn with_seed(failure_rate: f64, latency: Duration, seed: u64) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
            latency,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl SettingsTransmitter for SimulatedTransmitter {
    async fn transmit(&self, _settings: &CoolerSettings) -> Result<bool, TransmitError> {
        tokio::time::sleep(self.latency).await;
        let roll: f64 = self.rng.lock().await.gen();
        Ok(roll >= self.failure_rate)
    }
}

/// Outcome of one transmission run, ready for operator display
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub success: bool,
    pub message: String,
    /// Remediation checklist, populated on failure
    pub remediation: Vec<String>,
}

/// Device applier
///
/// **[DEV-APP-010]** Wraps the transmitter and converts its result into an
/// operator-facing outcome. Status transitions themselves live on
/// `ApplicationAttempt`; the controller sequences the two.
pub struct DeviceApplier {
    transmitter: Arc<dyn SettingsTransmitter>,
}

impl DeviceApplier {
    pub fn new(transmitter: Arc<dyn SettingsTransmitter>) -> Self {
        Self { transmitter }
    }

    /// Remediation checklist shown with every transmission failure
    pub fn remediation_hints() -> Vec<String> {
        vec![
            "Check network connectivity".to_string(),
            "Ensure the cooling unit is powered on".to_string(),
            "Verify the unit is not in maintenance mode".to_string(),
        ]
    }

    /// Run one transmission and fold the result into an outcome
    ///
    /// Transport errors and clean rejections both resolve to a failed outcome
    /// with remediation hints; neither propagates as an error.
    pub async fn run(&self, settings: &CoolerSettings) -> ApplyOutcome {
        match self.transmitter.transmit(settings).await {
            Ok(true) => ApplyOutcome {
                success: true,
                message: "Settings successfully applied to the cooling unit".to_string(),
                remediation: Vec::new(),
            },
            Ok(false) => {
                tracing::warn!("Device declined the settings");
                ApplyOutcome {
                    success: false,
                    message: "Failed to connect to the cooling unit. Please check your connection."
                        .to_string(),
                    remediation: Self::remediation_hints(),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Settings transmission failed");
                ApplyOutcome {
                    success: false,
                    message: format!("Failed to apply settings: {}", e),
                    remediation: Self::remediation_hints(),
                }
            }
        }
    }
}
