//! In-memory implementation of the service traits.
//!
//! Responses, delays and failures are scripted up front, which makes the
//! overlay and capture flows deterministic in unit tests and lets the stub
//! server serve fixed fixtures during local development.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::service::{ClassificationService, IngestionService, RiskService};
use crate::api::{ClassificationResponse, IngestionPayload, RiskPointDto, RiskQuery};
use crate::error::{ErrorContext, PipelineError, PipelineResult};
use crate::models::{ImageBlob, Prediction};

/// A scripted failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalFailure {
    /// Behaves like an unreachable host
    Transport,
    /// Behaves like a non-2xx response with this status
    Status(u16),
    /// Behaves like a 2xx response whose body does not parse
    Malformed,
}

/// Tag carried in `ErrorContext::details` by [`LocalFailure::Malformed`]
/// errors, so a server can answer with an unparsable 2xx body.
pub const MALFORMED_RESPONSE_DETAIL: &str = "scripted malformed response";

impl LocalFailure {
    /// Whether `err` was produced by [`LocalFailure::Malformed`].
    pub fn is_malformed(err: &PipelineError) -> bool {
        err.context().details.as_deref() == Some(MALFORMED_RESPONSE_DETAIL)
    }

    fn into_error(self, operation: &str) -> PipelineError {
        let context = ErrorContext::new(operation).with_endpoint("local");
        match self {
            LocalFailure::Transport => {
                PipelineError::transport_with_context("connection refused", context)
            }
            LocalFailure::Status(code) => PipelineError::service_with_context(
                format!("HTTP {}", code),
                context.with_status(code),
            ),
            LocalFailure::Malformed => PipelineError::service_with_context(
                "Malformed response: expected value",
                context.with_details(MALFORMED_RESPONSE_DETAIL),
            ),
        }
    }
}

#[derive(Clone)]
struct ScriptedClassification {
    response: ClassificationResponse,
    delay: Duration,
}

struct LocalData {
    risk_points: Vec<RiskPointDto>,
    risk_delay: Duration,
    risk_failure: Option<LocalFailure>,
    risk_queries: Vec<RiskQuery>,

    // Keyed by image reference (SHA-256 of the bytes)
    classifications: HashMap<String, ScriptedClassification>,
    default_classification: ScriptedClassification,
    classification_failure: Option<LocalFailure>,

    ingestion_delay: Duration,
    ingestion_failure: Option<LocalFailure>,
    reports: Vec<IngestionPayload>,

    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            risk_points: Vec::new(),
            risk_delay: Duration::ZERO,
            risk_failure: None,
            risk_queries: Vec::new(),
            classifications: HashMap::new(),
            default_classification: ScriptedClassification {
                response: ClassificationResponse::default(),
                delay: Duration::ZERO,
            },
            classification_failure: None,
            ingestion_delay: Duration::ZERO,
            ingestion_failure: None,
            reports: Vec::new(),
            is_healthy: true,
        }
    }
}

/// In-memory stand-in for all three services.
#[derive(Clone, Default)]
pub struct LocalServices {
    data: Arc<RwLock<LocalData>>,
    counters: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    risk_calls: AtomicUsize,
    classification_calls: AtomicUsize,
    ingestion_calls: AtomicUsize,
    risk_in_flight: AtomicUsize,
    max_risk_in_flight: AtomicUsize,
}

impl LocalServices {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Risk ====================

    /// Points returned by every successful risk query.
    pub fn set_risk_points(&self, points: Vec<RiskPointDto>) {
        self.data.write().risk_points = points;
    }

    pub fn set_risk_delay(&self, delay: Duration) {
        self.data.write().risk_delay = delay;
    }

    /// Make risk queries fail until cleared with `None`.
    pub fn set_risk_failure(&self, failure: Option<LocalFailure>) {
        self.data.write().risk_failure = failure;
    }

    /// Centers of every risk query received, in order.
    pub fn risk_queries(&self) -> Vec<RiskQuery> {
        self.data.read().risk_queries.clone()
    }

    pub fn risk_calls(&self) -> usize {
        self.counters.risk_calls.load(Ordering::SeqCst)
    }

    /// Highest number of risk queries observed running at the same time.
    pub fn max_concurrent_risk_calls(&self) -> usize {
        self.counters.max_risk_in_flight.load(Ordering::SeqCst)
    }

    // ==================== Classification ====================

    /// Script the response for one specific image.
    pub fn script_classification(
        &self,
        image: &ImageBlob,
        predictions: Vec<Prediction>,
        delay: Duration,
    ) {
        self.data.write().classifications.insert(
            image.image_ref(),
            ScriptedClassification {
                response: ClassificationResponse {
                    predictions: Some(predictions),
                },
                delay,
            },
        );
    }

    /// Response for images without a scripted entry.
    pub fn set_default_classification(&self, response: ClassificationResponse, delay: Duration) {
        self.data.write().default_classification = ScriptedClassification { response, delay };
    }

    pub fn set_classification_failure(&self, failure: Option<LocalFailure>) {
        self.data.write().classification_failure = failure;
    }

    pub fn classification_calls(&self) -> usize {
        self.counters.classification_calls.load(Ordering::SeqCst)
    }

    // ==================== Ingestion ====================

    pub fn set_ingestion_delay(&self, delay: Duration) {
        self.data.write().ingestion_delay = delay;
    }

    pub fn set_ingestion_failure(&self, failure: Option<LocalFailure>) {
        self.data.write().ingestion_failure = failure;
    }

    /// Reports accepted so far.
    pub fn submitted_reports(&self) -> Vec<IngestionPayload> {
        self.data.read().reports.clone()
    }

    pub fn ingestion_calls(&self) -> usize {
        self.counters.ingestion_calls.load(Ordering::SeqCst)
    }

    // ==================== Health ====================

    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    pub fn is_healthy(&self) -> bool {
        self.data.read().is_healthy
    }
}

/// Decrements the in-flight counter even when the call is cancelled mid-sleep.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RiskService for LocalServices {
    async fn fetch_risk_points(&self, query: RiskQuery) -> PipelineResult<Vec<RiskPointDto>> {
        self.counters.risk_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.counters.risk_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .max_risk_in_flight
            .fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.counters.risk_in_flight);

        let (delay, failure, points) = {
            let mut data = self.data.write();
            data.risk_queries.push(query);
            (data.risk_delay, data.risk_failure, data.risk_points.clone())
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match failure {
            Some(failure) => Err(failure.into_error("fetch_risk_points")),
            None => Ok(points),
        }
    }
}

#[async_trait]
impl ClassificationService for LocalServices {
    async fn classify(&self, image: &ImageBlob) -> PipelineResult<ClassificationResponse> {
        self.counters
            .classification_calls
            .fetch_add(1, Ordering::SeqCst);

        let (scripted, failure) = {
            let data = self.data.read();
            let scripted = data
                .classifications
                .get(&image.image_ref())
                .cloned()
                .unwrap_or_else(|| data.default_classification.clone());
            (scripted, data.classification_failure)
        };

        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }

        match failure {
            Some(failure) => Err(failure.into_error("classify")),
            None => Ok(scripted.response),
        }
    }
}

#[async_trait]
impl IngestionService for LocalServices {
    async fn submit_report(
        &self,
        payload: &IngestionPayload,
        _image: &ImageBlob,
    ) -> PipelineResult<()> {
        self.counters.ingestion_calls.fetch_add(1, Ordering::SeqCst);

        let (delay, failure) = {
            let data = self.data.read();
            (data.ingestion_delay, data.ingestion_failure)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(failure) = failure {
            return Err(failure.into_error("submit_report"));
        }

        self.data.write().reports.push(payload.clone());
        Ok(())
    }
}
