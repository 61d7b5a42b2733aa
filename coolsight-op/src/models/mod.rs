//! Service-local model types for coolsight-op

pub mod image;
pub mod pipeline_session;

pub use image::ImageUpload;
pub use pipeline_session::{
    ApplicationAttempt, PipelineSession, SessionSnapshot, StageTransition, StateError,
    StatusTransition,
};
