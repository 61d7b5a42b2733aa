//! Core services for coolsight-op

pub mod classifier;
pub mod device_applier;
pub mod pipeline;
pub mod recommendation_engine;

pub use classifier::{CannedClassifier, ClassifyError, HttpVisionClassifier, InventoryClassifier};
pub use device_applier::{
    ApplyOutcome, DeviceApplier, HttpTransmitter, SettingsTransmitter, SimulatedTransmitter,
    TransmitError,
};
pub use pipeline::{PipelineController, PipelineError};
pub use recommendation_engine::RecommendationEngine;
