//! Pipeline API handlers
//!
//! Each endpoint corresponds to exactly one operator action; preconditions
//! are checked by the controller before any external call, so a rejected
//! request never changes state.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::ApiResult,
    models::{ImageUpload, SessionSnapshot},
    AppState,
};
use coolsight_common::models::ClassifiedItem;

/// POST /pipeline/images request
#[derive(Debug, Deserialize)]
pub struct UploadImagesRequest {
    pub images: Vec<ImageUpload>,
}

/// POST /pipeline/inventory/confirm request
///
/// The operator submits the full edited item list; items without a confidence
/// value are manual entries.
#[derive(Debug, Deserialize)]
pub struct ConfirmInventoryRequest {
    #[serde(default)]
    pub items: Vec<ClassifiedItem>,
}

/// GET /pipeline
///
/// Current session snapshot.
pub async fn get_pipeline(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.pipeline.snapshot().await)
}

/// POST /pipeline/images
///
/// Store the uploaded images, advance Upload → Detect, and start
/// classification in the background. 400 with zero images.
pub async fn upload_images(
    State(state): State<AppState>,
    Json(request): Json<UploadImagesRequest>,
) -> ApiResult<Json<SessionSnapshot>> {
    let snapshot = state.pipeline.clone().upload_images(request.images).await?;
    Ok(Json(snapshot))
}

/// POST /pipeline/inventory/confirm
///
/// Accept the operator's (possibly edited, possibly empty) inventory, advance
/// Detect → Recommend, and derive the recommendation.
pub async fn confirm_inventory(
    State(state): State<AppState>,
    Json(request): Json<ConfirmInventoryRequest>,
) -> ApiResult<Json<SessionSnapshot>> {
    let snapshot = state.pipeline.confirm_inventory(request.items).await?;
    Ok(Json(snapshot))
}

/// POST /pipeline/recommendation/accept
pub async fn accept_recommendation(
    State(state): State<AppState>,
) -> ApiResult<Json<SessionSnapshot>> {
    let snapshot = state.pipeline.accept_recommendation().await?;
    Ok(Json(snapshot))
}

/// POST /pipeline/recommendation/reject
///
/// Terminal for the run; never transmits.
pub async fn reject_recommendation(
    State(state): State<AppState>,
) -> ApiResult<Json<SessionSnapshot>> {
    let snapshot = state.pipeline.reject_recommendation().await?;
    Ok(Json(snapshot))
}

/// POST /pipeline/apply
///
/// Start a transmission attempt. 409 while a transmission is in flight or
/// after success.
pub async fn apply_settings(State(state): State<AppState>) -> ApiResult<Json<SessionSnapshot>> {
    let snapshot = state.pipeline.clone().apply_settings().await?;
    Ok(Json(snapshot))
}

/// POST /pipeline/apply/retry
///
/// Re-enter connecting from a failed attempt with the same settings snapshot.
pub async fn retry_apply(State(state): State<AppState>) -> ApiResult<Json<SessionSnapshot>> {
    let snapshot = state.pipeline.clone().retry().await?;
    Ok(Json(snapshot))
}

/// POST /pipeline/complete
///
/// Acknowledge a successful apply and return the pipeline to Upload.
pub async fn complete(State(state): State<AppState>) -> ApiResult<Json<SessionSnapshot>> {
    let snapshot = state.pipeline.complete().await?;
    Ok(Json(snapshot))
}

/// POST /pipeline/reset
///
/// Global start-over from any stage.
pub async fn reset(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.pipeline.reset().await)
}

/// Build pipeline routes
pub fn pipeline_routes() -> Router<AppState> {
    Router::new()
        .route("/pipeline", get(get_pipeline))
        .route("/pipeline/images", post(upload_images))
        .route("/pipeline/inventory/confirm", post(confirm_inventory))
        .route("/pipeline/recommendation/accept", post(accept_recommendation))
        .route("/pipeline/recommendation/reject", post(reject_recommendation))
        .route("/pipeline/apply", post(apply_settings))
        .route("/pipeline/apply/retry", post(retry_apply))
        .route("/pipeline/complete", post(complete))
        .route("/pipeline/reset", post(reset))
}
