//! Event types for the CoolSight event system
//!
//! Provides shared event definitions and the EventBus used by the
//! optimization-pipeline service to broadcast progress to SSE clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{ApplyStatus, CoolerSettings, PipelineStage, Recommendation};

/// CoolSight event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// All events use this central enum for type safety and exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CoolSightEvent {
    /// Pipeline advanced to a new stage (or returned to Upload on reset)
    StageChanged {
        session_id: Uuid,
        old_stage: PipelineStage,
        new_stage: PipelineStage,
        timestamp: DateTime<Utc>,
    },

    /// Classification of the uploaded images began
    DetectionStarted {
        session_id: Uuid,
        image_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Classification finished; the inventory is ready for operator review
    DetectionCompleted {
        session_id: Uuid,
        item_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Classification failed; the operator may re-submit images
    DetectionFailed {
        session_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// The engine produced a recommendation for the confirmed inventory
    RecommendationReady {
        session_id: Uuid,
        recommendation: Recommendation,
        timestamp: DateTime<Utc>,
    },

    /// A transmission attempt changed connection status
    ApplyStatusChanged {
        session_id: Uuid,
        old_status: ApplyStatus,
        new_status: ApplyStatus,
        timestamp: DateTime<Utc>,
    },

    /// Settings were accepted by the device; the run can be completed
    ApplySucceeded {
        session_id: Uuid,
        settings: CoolerSettings,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Transmission failed; remediation hints accompany the retry option
    ApplyFailed {
        session_id: Uuid,
        message: String,
        remediation: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// The run was discarded and the pipeline returned to Upload
    PipelineReset {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl CoolSightEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            CoolSightEvent::StageChanged { .. } => "StageChanged",
            CoolSightEvent::DetectionStarted { .. } => "DetectionStarted",
            CoolSightEvent::DetectionCompleted { .. } => "DetectionCompleted",
            CoolSightEvent::DetectionFailed { .. } => "DetectionFailed",
            CoolSightEvent::RecommendationReady { .. } => "RecommendationReady",
            CoolSightEvent::ApplyStatusChanged { .. } => "ApplyStatusChanged",
            CoolSightEvent::ApplySucceeded { .. } => "ApplySucceeded",
            CoolSightEvent::ApplyFailed { .. } => "ApplyFailed",
            CoolSightEvent::PipelineReset { .. } => "PipelineReset",
        }
    }
}

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CoolSightEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<CoolSightEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CoolSightEvent,
    ) -> Result<usize, broadcast::error::SendError<CoolSightEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Progress events are acceptable to drop when no UI is connected.
    pub fn emit_lossy(&self, event: CoolSightEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
