//! Inventory classifier integration
//!
//! **[CSP-INT-010]** The image-recognition inference provider is external;
//! this module defines the consumed contract and the two implementations: an
//! HTTP client for a real provider and a canned classifier for development and
//! tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::models::ImageUpload;
use coolsight_common::models::{ClassifiedItem, FoodCategory};

const USER_AGENT: &str = "CoolSight/0.1.0 (coolsight-op)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Classifier errors
///
/// All variants surface to the operator as a detection failure; the pipeline
/// stays on the Detect stage and images may be re-submitted.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Classifier error {0}: {1}")]
    Provider(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Image classification capability
///
/// A single awaited call, no streaming or partial results. Implementations
/// must be usable from spawned tasks.
#[async_trait]
pub trait InventoryClassifier: Send + Sync {
    async fn classify(
        &self,
        images: &[ImageUpload],
    ) -> Result<Vec<ClassifiedItem>, ClassifyError>;
}

/// Inference provider response body
#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    items: Vec<ClassifiedItem>,
}

/// HTTP client for a remote vision inference provider
///
/// Posts the opaque image payloads as JSON and decodes the classified item
/// list from the response.
pub struct HttpVisionClassifier {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpVisionClassifier {
    pub fn new(endpoint: String) -> Result<Self, ClassifyError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClassifyError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }
}

#[async_trait]
impl InventoryClassifier for HttpVisionClassifier {
    async fn classify(
        &self,
        images: &[ImageUpload],
    ) -> Result<Vec<ClassifiedItem>, ClassifyError> {
        tracing::debug!(
            image_count = images.len(),
            endpoint = %self.endpoint,
            "Querying vision classifier"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "images": images }))
            .send()
            .await
            .map_err(|e| ClassifyError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Provider(status.as_u16(), error_text));
        }

        let body: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| ClassifyError::Parse(e.to_string()))?;

        tracing::info!(
            item_count = body.items.len(),
            "Vision classifier returned inventory"
        );

        Ok(body.items)
    }
}

/// Fixed-latency classifier returning a canned demo inventory
///
/// Stands in for the inference provider when no endpoint is configured.
pub struct CannedClassifier {
    latency: Duration,
}

impl CannedClassifier {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    /// The demo inventory: a plausible mixed refrigerator load
    pub fn demo_inventory() -> Vec<ClassifiedItem> {
        fn entry(
            name: &str,
            quantity: &str,
            confidence: u8,
            category: FoodCategory,
        ) -> ClassifiedItem {
            ClassifiedItem {
                name: name.to_string(),
                quantity: quantity.to_string(),
                confidence,
                category,
            }
        }

        vec![
            entry("Milk", "1 bottle", 95, FoodCategory::Dairy),
            entry("Apples", "6 pieces", 88, FoodCategory::Fruits),
            entry("Chicken Breast", "2 pieces", 92, FoodCategory::Meat),
            entry("Lettuce", "1 head", 85, FoodCategory::Vegetables),
            entry("Orange Juice", "1 carton", 90, FoodCategory::Beverages),
            entry("Yogurt", "4 cups", 87, FoodCategory::Dairy),
        ]
    }
}

#[async_trait]
impl InventoryClassifier for CannedClassifier {
    async fn classify(
        &self,
        images: &[ImageUpload],
    ) -> Result<Vec<ClassifiedItem>, ClassifyError> {
        tracing::debug!(image_count = images.len(), "Canned classification");
        tokio::time::sleep(self.latency).await;
        Ok(Self::demo_inventory())
    }
}
