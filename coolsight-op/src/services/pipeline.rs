//! Pipeline controller
//!
//! **[CSP-WF-020]** Orchestrates one run at a time through the four stages,
//! owning the working data (images count, inventory, recommendation, attempt)
//! and broadcasting every transition on the event bus. The two external
//! suspensions — classification and transmission — run in spawned tasks that
//! re-check the session generation before writing their result back, so a
//! reset mid-flight leaves nothing dangling.

use std::sync::Arc;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::models::{ApplicationAttempt, ImageUpload, PipelineSession, SessionSnapshot, StateError};
use crate::services::classifier::InventoryClassifier;
use crate::services::device_applier::DeviceApplier;
use crate::services::recommendation_engine::RecommendationEngine;
use coolsight_common::events::{CoolSightEvent, EventBus};
use coolsight_common::models::{ApplyStatus, ClassifiedItem, CoolerSettings, PipelineStage};

/// Stage-precondition and state-machine violations
///
/// All of these are rejected before any external call is made; no state
/// changes on error.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("At least one image is required")]
    NoImages,

    #[error("Pipeline is on stage {actual:?}, expected {expected:?}")]
    WrongStage {
        expected: PipelineStage,
        actual: PipelineStage,
    },

    #[error("Classification still in progress")]
    DetectionInProgress,

    #[error("No recommendation available")]
    NoRecommendation,

    #[error("No application attempt in progress")]
    NoAttempt,

    #[error("Retry is only available after a failed attempt")]
    RetryUnavailable,

    #[error("Settings have not been applied yet")]
    NotSucceeded,

    #[error(transparent)]
    State(#[from] StateError),
}

/// Pipeline controller
///
/// Holds exactly one session; the injected classifier and transmitter keep
/// the controller testable without a real inference provider or device.
pub struct PipelineController {
    session: RwLock<PipelineSession>,
    classifier: Arc<dyn InventoryClassifier>,
    applier: DeviceApplier,
    engine: RecommendationEngine,
    rng: Mutex<StdRng>,
    event_bus: EventBus,
    last_error: Arc<RwLock<Option<String>>>,
}

impl PipelineController {
    pub fn new(
        classifier: Arc<dyn InventoryClassifier>,
        applier: DeviceApplier,
        event_bus: EventBus,
    ) -> Self {
        Self::with_rng_seed(classifier, applier, event_bus, rand::random())
    }

    /// Seeded constructor for reproducible estimate figures in tests
    pub fn with_rng_seed(
        classifier: Arc<dyn InventoryClassifier>,
        applier: DeviceApplier,
        event_bus: EventBus,
        seed: u64,
    ) -> Self {
        Self {
            session: RwLock::new(PipelineSession::new()),
            classifier,
            applier,
            engine: RecommendationEngine::new(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            event_bus,
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Shared handle to the last external-call failure, for diagnostics
    pub fn last_error_handle(&self) -> Arc<RwLock<Option<String>>> {
        self.last_error.clone()
    }

    /// Current session view
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.read().await.snapshot()
    }

    /// Upload → Detect: store the images and start classification
    ///
    /// Also accepted on Detect after a failed or completed classification, so
    /// the operator can re-submit images without resetting the run.
    pub async fn upload_images(
        self: Arc<Self>,
        images: Vec<ImageUpload>,
    ) -> Result<SessionSnapshot, PipelineError> {
        if images.is_empty() || images.iter().all(ImageUpload::is_empty) {
            return Err(PipelineError::NoImages);
        }

        let snapshot;
        let session_id;
        let generation;
        {
            let mut session = self.session.write().await;
            match session.stage {
                PipelineStage::Upload => {
                    let transition = session.transition_to(PipelineStage::Detect);
                    self.event_bus.emit_lossy(CoolSightEvent::StageChanged {
                        session_id: transition.session_id,
                        old_stage: transition.old_stage,
                        new_stage: transition.new_stage,
                        timestamp: transition.transitioned_at,
                    });
                }
                PipelineStage::Detect if session.detection_running => {
                    return Err(PipelineError::DetectionInProgress);
                }
                PipelineStage::Detect => {
                    // Re-submission replaces the previous detection result
                    session.inventory.clear();
                }
                actual => {
                    return Err(PipelineError::WrongStage {
                        expected: PipelineStage::Upload,
                        actual,
                    });
                }
            }

            session.image_count = images.len();
            session.detection_running = true;
            session_id = session.session_id;
            generation = session.generation;

            tracing::info!(
                session_id = %session_id,
                image_count = images.len(),
                "Starting inventory classification"
            );
            self.event_bus.emit_lossy(CoolSightEvent::DetectionStarted {
                session_id,
                image_count: images.len(),
                timestamp: Utc::now(),
            });

            snapshot = session.snapshot();
        }

        let controller = self.clone();
        tokio::spawn(async move {
            controller.run_detection(session_id, generation, images).await;
        });

        Ok(snapshot)
    }

    /// Background classification task body
    async fn run_detection(&self, session_id: uuid::Uuid, generation: u64, images: Vec<ImageUpload>) {
        let result = self.classifier.classify(&images).await;

        let mut session = self.session.write().await;
        if session.generation != generation || session.stage != PipelineStage::Detect {
            tracing::debug!(
                session_id = %session_id,
                "Discarding classification result for a reset pipeline"
            );
            return;
        }
        session.detection_running = false;

        match result {
            Ok(items) => {
                tracing::info!(
                    session_id = %session_id,
                    item_count = items.len(),
                    "Classification completed"
                );
                session.inventory = items;
                self.event_bus.emit_lossy(CoolSightEvent::DetectionCompleted {
                    session_id,
                    item_count: session.inventory.len(),
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Classification failed");
                *self.last_error.write().await = Some(e.to_string());
                self.event_bus.emit_lossy(CoolSightEvent::DetectionFailed {
                    session_id,
                    message: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
    }

    /// Detect → Recommend: accept the operator's edited inventory and derive
    /// the recommendation
    ///
    /// An empty inventory is permitted and yields the baseline settings.
    pub async fn confirm_inventory(
        &self,
        items: Vec<ClassifiedItem>,
    ) -> Result<SessionSnapshot, PipelineError> {
        let mut session = self.session.write().await;
        if session.stage != PipelineStage::Detect {
            return Err(PipelineError::WrongStage {
                expected: PipelineStage::Detect,
                actual: session.stage,
            });
        }
        if session.detection_running {
            return Err(PipelineError::DetectionInProgress);
        }

        session.inventory = items;

        let recommendation = {
            let mut rng = self.rng.lock().await;
            self.engine.recommend(&session.inventory, &mut *rng)
        };

        tracing::info!(
            session_id = %session.session_id,
            item_count = session.inventory.len(),
            temperature_c = recommendation.settings.temperature_c,
            humidity_pct = recommendation.settings.humidity_pct,
            energy_mode = recommendation.settings.energy_mode.as_str(),
            "Recommendation derived"
        );

        session.recommendation = Some(recommendation.clone());
        let transition = session.transition_to(PipelineStage::Recommend);
        self.event_bus.emit_lossy(CoolSightEvent::StageChanged {
            session_id: transition.session_id,
            old_stage: transition.old_stage,
            new_stage: transition.new_stage,
            timestamp: transition.transitioned_at,
        });
        self.event_bus
            .emit_lossy(CoolSightEvent::RecommendationReady {
                session_id: session.session_id,
                recommendation,
                timestamp: Utc::now(),
            });

        Ok(session.snapshot())
    }

    /// Recommend → Apply: operator accepted the recommendation
    pub async fn accept_recommendation(&self) -> Result<SessionSnapshot, PipelineError> {
        let mut session = self.session.write().await;
        if session.stage != PipelineStage::Recommend {
            return Err(PipelineError::WrongStage {
                expected: PipelineStage::Recommend,
                actual: session.stage,
            });
        }

        let settings = match session.recommendation.as_ref() {
            Some(r) => r.settings.clone(),
            None => return Err(PipelineError::NoRecommendation),
        };
        session.attempt = Some(ApplicationAttempt::new(settings));

        let transition = session.transition_to(PipelineStage::Apply);
        self.event_bus.emit_lossy(CoolSightEvent::StageChanged {
            session_id: transition.session_id,
            old_stage: transition.old_stage,
            new_stage: transition.new_stage,
            timestamp: transition.transitioned_at,
        });

        Ok(session.snapshot())
    }

    /// Reject the recommendation without transmitting; terminal for the run
    ///
    /// Valid on Recommend, or on Apply while no transmission is in flight and
    /// none has succeeded.
    pub async fn reject_recommendation(&self) -> Result<SessionSnapshot, PipelineError> {
        let mut session = self.session.write().await;
        match session.stage {
            PipelineStage::Recommend => {}
            PipelineStage::Apply => match session.attempt.as_ref().map(|a| a.status) {
                Some(ApplyStatus::Connecting) => return Err(StateError::InFlight.into()),
                Some(ApplyStatus::Success) => return Err(StateError::AlreadyApplied.into()),
                _ => {}
            },
            actual => {
                return Err(PipelineError::WrongStage {
                    expected: PipelineStage::Recommend,
                    actual,
                });
            }
        }

        tracing::info!(session_id = %session.session_id, "Recommendation rejected");
        Ok(self.reset_locked(&mut session))
    }

    /// Start a transmission attempt (IDLE | ERROR → CONNECTING)
    pub async fn apply_settings(self: Arc<Self>) -> Result<SessionSnapshot, PipelineError> {
        self.start_transmission(false).await
    }

    /// Re-enter CONNECTING from ERROR with the same settings snapshot
    pub async fn retry(self: Arc<Self>) -> Result<SessionSnapshot, PipelineError> {
        self.start_transmission(true).await
    }

    async fn start_transmission(
        self: Arc<Self>,
        retrying: bool,
    ) -> Result<SessionSnapshot, PipelineError> {
        let snapshot;
        let session_id;
        let generation;
        let settings;
        {
            let mut session = self.session.write().await;
            if session.stage != PipelineStage::Apply {
                return Err(PipelineError::WrongStage {
                    expected: PipelineStage::Apply,
                    actual: session.stage,
                });
            }
            let attempt = session.attempt.as_mut().ok_or(PipelineError::NoAttempt)?;
            if retrying && attempt.status != ApplyStatus::Error {
                return Err(PipelineError::RetryUnavailable);
            }

            let transition = attempt.begin_connecting()?;
            settings = attempt.settings.clone();
            session_id = session.session_id;
            generation = session.generation;

            tracing::info!(
                session_id = %session_id,
                retrying,
                "Transmitting settings to the cooling unit"
            );
            self.event_bus
                .emit_lossy(CoolSightEvent::ApplyStatusChanged {
                    session_id,
                    old_status: transition.old_status,
                    new_status: transition.new_status,
                    timestamp: transition.transitioned_at,
                });

            snapshot = session.snapshot();
        }

        let controller = self.clone();
        tokio::spawn(async move {
            controller
                .run_transmission(session_id, generation, settings)
                .await;
        });

        Ok(snapshot)
    }

    /// Background transmission task body
    async fn run_transmission(
        &self,
        session_id: uuid::Uuid,
        generation: u64,
        settings: CoolerSettings,
    ) {
        let outcome = self.applier.run(&settings).await;

        let mut session = self.session.write().await;
        if session.generation != generation || session.stage != PipelineStage::Apply {
            tracing::debug!(
                session_id = %session_id,
                "Discarding transmission result for a reset pipeline"
            );
            return;
        }
        let Some(attempt) = session.attempt.as_mut() else {
            return;
        };

        let transition = match attempt.resolve(outcome.success) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Stale transmission result");
                return;
            }
        };

        self.event_bus
            .emit_lossy(CoolSightEvent::ApplyStatusChanged {
                session_id,
                old_status: transition.old_status,
                new_status: transition.new_status,
                timestamp: transition.transitioned_at,
            });

        if outcome.success {
            tracing::info!(session_id = %session_id, "Settings applied to device");
            self.event_bus.emit_lossy(CoolSightEvent::ApplySucceeded {
                session_id,
                settings,
                message: outcome.message,
                timestamp: Utc::now(),
            });
        } else {
            tracing::warn!(session_id = %session_id, message = %outcome.message, "Apply failed");
            *self.last_error.write().await = Some(outcome.message.clone());
            self.event_bus.emit_lossy(CoolSightEvent::ApplyFailed {
                session_id,
                message: outcome.message,
                remediation: outcome.remediation,
                timestamp: Utc::now(),
            });
        }
    }

    /// Acknowledge success and finish the run (Apply → Upload)
    pub async fn complete(&self) -> Result<SessionSnapshot, PipelineError> {
        let mut session = self.session.write().await;
        if session.stage != PipelineStage::Apply {
            return Err(PipelineError::WrongStage {
                expected: PipelineStage::Apply,
                actual: session.stage,
            });
        }
        match session.attempt.as_ref().map(|a| a.status) {
            Some(ApplyStatus::Success) => {}
            _ => return Err(PipelineError::NotSucceeded),
        }

        tracing::info!(session_id = %session.session_id, "Run completed");
        Ok(self.reset_locked(&mut session))
    }

    /// Global start-over: discard the run from any stage
    pub async fn reset(&self) -> SessionSnapshot {
        let mut session = self.session.write().await;
        tracing::info!(session_id = %session.session_id, stage = ?session.stage, "Pipeline reset");
        self.reset_locked(&mut session)
    }

    fn reset_locked(&self, session: &mut PipelineSession) -> SessionSnapshot {
        let old_session_id = session.session_id;
        session.reset_run();
        self.event_bus.emit_lossy(CoolSightEvent::PipelineReset {
            session_id: old_session_id,
            timestamp: Utc::now(),
        });
        session.snapshot()
    }
}
