//! Shared domain model types for CoolSight
//!
//! **[CSC-MOD-010]** These types form the wire contract between the
//! optimization-pipeline service and its UI clients. All of them serialize to
//! JSON for the HTTP API and for SSE event payloads.

use serde::{Deserialize, Serialize};

/// Food category assigned by the classifier (or by manual entry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodCategory {
    Meat,
    Dairy,
    Vegetables,
    Fruits,
    Beverages,
    Other,
}

impl FoodCategory {
    /// Meat and dairy spoil fastest and drive the temperature/energy-mode
    /// adjustments.
    pub fn is_perishable(self) -> bool {
        matches!(self, FoodCategory::Meat | FoodCategory::Dairy)
    }
}

/// Confidence assigned to manually entered items
pub const MANUAL_ENTRY_CONFIDENCE: u8 = 100;

fn manual_entry_confidence() -> u8 {
    MANUAL_ENTRY_CONFIDENCE
}

/// One classified food item
///
/// Produced by the inventory classifier, or entered by the operator while
/// reviewing the detection result. Items arriving without a confidence value
/// are treated as manual entries (confidence 100).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedItem {
    pub name: String,
    /// Free-form quantity ("2 pieces", "1 carton")
    pub quantity: String,
    /// Classifier confidence, 0-100
    #[serde(default = "manual_entry_confidence")]
    pub confidence: u8,
    pub category: FoodCategory,
}

/// Cooler energy mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyMode {
    Eco,
    Standard,
    Performance,
}

impl EnergyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyMode::Eco => "eco",
            EnergyMode::Standard => "standard",
            EnergyMode::Performance => "performance",
        }
    }
}

/// Climate-control settings for one cooling unit
///
/// **[CSC-MOD-020]** Field bounds are enforced by `validate()`; the
/// recommendation engine must never emit an out-of-bounds value. No physical
/// consistency between fields is guaranteed beyond the individual ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoolerSettings {
    /// Target temperature in degrees Celsius
    pub temperature_c: i32,
    /// Relative humidity, 0-100 percent
    pub humidity_pct: u8,
    /// Airflow, 0-100 percent
    pub airflow_pct: u8,
    /// Hours between defrost cycles (positive)
    pub defrost_cycle_hours: u32,
    pub energy_mode: EnergyMode,
}

impl CoolerSettings {
    /// Check the per-field bounds
    pub fn validate(&self) -> crate::Result<()> {
        if self.humidity_pct > 100 {
            return Err(crate::Error::InvalidInput(format!(
                "Humidity out of range: {}",
                self.humidity_pct
            )));
        }
        if self.airflow_pct > 100 {
            return Err(crate::Error::InvalidInput(format!(
                "Airflow out of range: {}",
                self.airflow_pct
            )));
        }
        if self.defrost_cycle_hours == 0 {
            return Err(crate::Error::InvalidInput(
                "Defrost cycle must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Recommendation bundle produced by the engine
///
/// Immutable once produced. The three estimate fields are informational only;
/// consumers may rely on their presence and bounds, never on exact values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub settings: CoolerSettings,
    /// Ordered human-readable justifications (always at least two entries)
    pub reasoning: Vec<String>,
    /// Estimated energy efficiency, 85-100 percent
    pub energy_efficiency_pct: u8,
    /// Estimated food preservation quality, 90-100 percent
    pub food_preservation_pct: u8,
    /// Currency string, e.g. "$18/month"
    pub estimated_monthly_savings: String,
}

/// Connection status of one settings-transmission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyStatus {
    Idle,
    Connecting,
    Success,
    Error,
}

/// Pipeline stage
///
/// **[CSP-WF-010]** The pipeline progresses strictly forward:
/// UPLOAD → DETECT → RECOMMEND → APPLY, then back to UPLOAD on completion or
/// reset. No partial backward navigation exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Upload,
    Detect,
    Recommend,
    Apply,
}
