//! Trait definitions for the external services.

use async_trait::async_trait;

use crate::api::{ClassificationResponse, IngestionPayload, RiskPointDto, RiskQuery};
use crate::error::PipelineResult;
use crate::models::ImageBlob;

/// Risk scoring service.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to work with async Rust.
#[async_trait]
pub trait RiskService: Send + Sync {
    /// Fetch raw risk points around a center coordinate.
    ///
    /// # Returns
    /// * `Ok(Vec<RiskPointDto>)` - Points as sent by the service, unchecked
    /// * `Err(PipelineError)` - Transport or service failure
    async fn fetch_risk_points(&self, query: RiskQuery) -> PipelineResult<Vec<RiskPointDto>>;
}

/// Image classification service.
#[async_trait]
pub trait ClassificationService: Send + Sync {
    /// Upload an image and return the service's response body.
    async fn classify(&self, image: &ImageBlob) -> PipelineResult<ClassificationResponse>;
}

/// Report ingestion service.
#[async_trait]
pub trait IngestionService: Send + Sync {
    /// Persist one report. A single request with a single outcome: either the
    /// report was accepted (`Ok`) or nothing was stored.
    async fn submit_report(
        &self,
        payload: &IngestionPayload,
        image: &ImageBlob,
    ) -> PipelineResult<()>;
}

/// Composite trait bound for a backend that provides all three services.
pub trait RemoteServices: RiskService + ClassificationService + IngestionService {}

impl<T> RemoteServices for T where T: RiskService + ClassificationService + IngestionService {}
