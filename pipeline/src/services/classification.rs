//! Classification client.
//!
//! Uploads a photo and turns the service's answer into a clean, ordered list
//! of predictions. Classification only assists the reporter, so every failure
//! is absorbed here: the caller always gets a list back, possibly empty.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::models::{sort_predictions, ImageBlob, Prediction};
use crate::remote::ClassificationService;

/// Result of one classification attempt.
#[derive(Debug)]
pub enum ClassificationOutcome {
    /// The service answered. Empty when it had nothing to offer.
    Classified(Vec<Prediction>),
    /// Transport failure, service failure, or timeout.
    Failed(PipelineError),
}

impl ClassificationOutcome {
    pub fn predictions(&self) -> &[Prediction] {
        match self {
            Self::Classified(predictions) => predictions,
            Self::Failed(_) => &[],
        }
    }

    pub fn into_predictions(self) -> Vec<Prediction> {
        match self {
            Self::Classified(predictions) => predictions,
            Self::Failed(_) => Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

pub struct ClassificationClient {
    service: Arc<dyn ClassificationService>,
    timeout: Duration,
}

impl ClassificationClient {
    pub fn new(service: Arc<dyn ClassificationService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Ranked predictions for `image`; empty on any failure.
    pub async fn classify(&self, image: &ImageBlob) -> Vec<Prediction> {
        self.classify_outcome(image).await.into_predictions()
    }

    /// Like [`ClassificationClient::classify`], but keeps the distinction
    /// between "nothing recognised" and "the call failed".
    pub async fn classify_outcome(&self, image: &ImageBlob) -> ClassificationOutcome {
        match self.request(image).await {
            Ok(predictions) => {
                debug!(count = predictions.len(), "classification completed");
                ClassificationOutcome::Classified(predictions)
            }
            Err(err) => {
                warn!(error = %err, "classification unavailable, continuing without predictions");
                ClassificationOutcome::Failed(err)
            }
        }
    }

    async fn request(&self, image: &ImageBlob) -> PipelineResult<Vec<Prediction>> {
        let response = tokio::time::timeout(self.timeout, self.service.classify(image))
            .await
            .map_err(|_| PipelineError::timeout("classify", self.timeout.as_millis() as u64))??;

        let Some(raw) = response.predictions else {
            return Ok(Vec::new());
        };
        Ok(normalize_predictions(raw))
    }
}

/// Drop entries that break the probability or label contract, then order
/// descending by probability. The service promises ordering; this does not
/// rely on it.
pub fn normalize_predictions(raw: Vec<Prediction>) -> Vec<Prediction> {
    let total = raw.len();
    let mut predictions: Vec<Prediction> = raw.into_iter().filter(Prediction::is_valid).collect();
    if predictions.len() < total {
        warn!(
            dropped = total - predictions.len(),
            "ignoring predictions outside the [0, 1] probability range or without a label"
        );
    }
    sort_predictions(&mut predictions);
    predictions
}
