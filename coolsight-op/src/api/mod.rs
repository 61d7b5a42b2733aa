//! HTTP API handlers for coolsight-op
//!
//! Operator actions map 1:1 to pipeline-controller transitions; progress is
//! streamed over SSE.

pub mod health;
pub mod pipeline;
pub mod sse;

pub use health::health_routes;
pub use pipeline::pipeline_routes;
pub use sse::event_stream;
