//! Pipeline session state machine
//!
//! **[CSP-WF-010]** A run progresses through 4 stages:
//! UPLOAD → DETECT → RECOMMEND → APPLY, then back to UPLOAD on completion or
//! reset. Within the Apply stage, one transmission attempt at a time moves
//! through IDLE → CONNECTING → {SUCCESS | ERROR}, with ERROR re-entering
//! CONNECTING on operator retry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use coolsight_common::models::{
    ApplyStatus, ClassifiedItem, CoolerSettings, PipelineStage, Recommendation,
};

/// Guard violations on attempt status transitions
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    /// A transmission is already in flight; re-submission is rejected
    #[error("Transmission already in progress")]
    InFlight,

    /// The attempt already succeeded; only `complete` is valid now
    #[error("Settings already applied")]
    AlreadyApplied,

    /// Resolution arrived while no transmission was in flight
    #[error("No transmission in progress")]
    NotConnecting,
}

/// **[CSP-WF-010]** Stage transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTransition {
    pub session_id: Uuid,
    pub old_stage: PipelineStage,
    pub new_stage: PipelineStage,
    pub transitioned_at: DateTime<Utc>,
}

/// Attempt status transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
    pub old_status: ApplyStatus,
    pub new_status: ApplyStatus,
    pub transitioned_at: DateTime<Utc>,
}

/// One transmission attempt of a recommendation's settings
///
/// Owned by the controller for the duration of the Apply stage and discarded
/// when the stage ends. The settings snapshot is fixed at creation; retry
/// re-sends the same snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationAttempt {
    pub status: ApplyStatus,
    pub settings: CoolerSettings,
}

impl ApplicationAttempt {
    pub fn new(settings: CoolerSettings) -> Self {
        Self {
            status: ApplyStatus::Idle,
            settings,
        }
    }

    /// IDLE | ERROR → CONNECTING
    ///
    /// Rejects re-entry while a transmission is in flight and after success.
    pub fn begin_connecting(&mut self) -> Result<StatusTransition, StateError> {
        match self.status {
            ApplyStatus::Idle | ApplyStatus::Error => {
                let transition = StatusTransition {
                    old_status: self.status,
                    new_status: ApplyStatus::Connecting,
                    transitioned_at: Utc::now(),
                };
                self.status = ApplyStatus::Connecting;
                Ok(transition)
            }
            ApplyStatus::Connecting => Err(StateError::InFlight),
            ApplyStatus::Success => Err(StateError::AlreadyApplied),
        }
    }

    /// CONNECTING → {SUCCESS | ERROR}
    pub fn resolve(&mut self, success: bool) -> Result<StatusTransition, StateError> {
        if self.status != ApplyStatus::Connecting {
            return Err(StateError::NotConnecting);
        }
        let new_status = if success {
            ApplyStatus::Success
        } else {
            ApplyStatus::Error
        };
        let transition = StatusTransition {
            old_status: self.status,
            new_status,
            transitioned_at: Utc::now(),
        };
        self.status = new_status;
        Ok(transition)
    }
}

/// **[CSP-WF-020]** Pipeline session (in-memory state for one run)
///
/// The controller exclusively owns the current inventory, recommendation, and
/// attempt; all three are discarded together on reset.
#[derive(Debug, Clone)]
pub struct PipelineSession {
    /// Unique run identifier (regenerated on reset)
    pub session_id: Uuid,

    /// Incremented on every reset; in-flight background results carrying a
    /// stale generation are discarded on arrival
    pub generation: u64,

    /// Current pipeline stage
    pub stage: PipelineStage,

    /// Number of images submitted for this run
    pub image_count: usize,

    /// Whether a classification call is in flight
    pub detection_running: bool,

    /// Classified items (classifier output, then the operator's edited list)
    pub inventory: Vec<ClassifiedItem>,

    /// Engine output, present from Recommend onward
    pub recommendation: Option<Recommendation>,

    /// Transmission attempt, present during Apply
    pub attempt: Option<ApplicationAttempt>,

    /// Run start time
    pub started_at: DateTime<Utc>,
}

/// Serializable view of the session for the HTTP API
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub stage: PipelineStage,
    pub image_count: usize,
    pub detection_running: bool,
    pub inventory: Vec<ClassifiedItem>,
    pub recommendation: Option<Recommendation>,
    pub apply_status: Option<ApplyStatus>,
    pub started_at: DateTime<Utc>,
}

impl PipelineSession {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            generation: 0,
            stage: PipelineStage::Upload,
            image_count: 0,
            detection_running: false,
            inventory: Vec::new(),
            recommendation: None,
            attempt: None,
            started_at: Utc::now(),
        }
    }

    /// Advance to a new stage
    ///
    /// Stage preconditions are checked by the controller; this records the
    /// transition.
    pub fn transition_to(&mut self, new_stage: PipelineStage) -> StageTransition {
        let transition = StageTransition {
            session_id: self.session_id,
            old_stage: self.stage,
            new_stage,
            transitioned_at: Utc::now(),
        };
        self.stage = new_stage;
        transition
    }

    /// Discard all run data and return to Upload as a fresh run
    pub fn reset_run(&mut self) {
        self.session_id = Uuid::new_v4();
        self.generation += 1;
        self.stage = PipelineStage::Upload;
        self.image_count = 0;
        self.detection_running = false;
        self.inventory.clear();
        self.recommendation = None;
        self.attempt = None;
        self.started_at = Utc::now();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            stage: self.stage,
            image_count: self.image_count,
            detection_running: self.detection_running,
            inventory: self.inventory.clone(),
            recommendation: self.recommendation.clone(),
            apply_status: self.attempt.as_ref().map(|a| a.status),
            started_at: self.started_at,
        }
    }
}

impl Default for PipelineSession {
    fn default() -> Self {
        Self::new()
    }
}
