//! HTTP implementation of the service traits.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use std::time::Duration;
use tracing::debug;

use super::service::{ClassificationService, IngestionService, RiskService};
use crate::api::{ClassificationResponse, HealthResponse, IngestionPayload, RiskPointDto, RiskQuery};
use crate::config::{IngestionFormat, PipelineConfig};
use crate::error::{ErrorContext, PipelineError, PipelineResult};
use crate::models::ImageBlob;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_ERROR_BODY: usize = 256;

/// Talks to the classification, risk and ingestion services over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    config: PipelineConfig,
}

impl HttpGateway {
    pub fn new(config: &PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                PipelineError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Probe `GET <risk-service-base>/`.
    pub async fn health_check(&self) -> PipelineResult<HealthResponse> {
        let mut base = Url::parse(&self.config.endpoints.risk_url)
            .map_err(|e| PipelineError::configuration(format!("Invalid risk_url: {}", e)))?;
        base.set_path("/");
        base.set_query(None);

        let response = self
            .client
            .get(base.clone())
            .timeout(self.config.risk_timeout())
            .send()
            .await
            .map_err(|e| PipelineError::from_reqwest(e, "health_check"))?;
        let body = read_success_body(response, "health_check").await?;

        serde_json::from_str(&body).map_err(|e| malformed("health_check", base.as_str(), e))
    }
}

#[async_trait]
impl RiskService for HttpGateway {
    async fn fetch_risk_points(&self, query: RiskQuery) -> PipelineResult<Vec<RiskPointDto>> {
        let url = &self.config.endpoints.risk_url;
        debug!(url = %url, lat = query.lat, lng = query.lng, "requesting risk points");

        let response = self
            .client
            .get(url)
            .query(&query)
            .timeout(self.config.risk_timeout())
            .send()
            .await
            .map_err(|e| PipelineError::from_reqwest(e, "fetch_risk_points"))?;
        let body = read_success_body(response, "fetch_risk_points").await?;

        serde_json::from_str(&body).map_err(|e| malformed("fetch_risk_points", url, e))
    }
}

#[async_trait]
impl ClassificationService for HttpGateway {
    async fn classify(&self, image: &ImageBlob) -> PipelineResult<ClassificationResponse> {
        let url = &self.config.endpoints.classification_url;
        debug!(url = %url, bytes = image.len(), mime = image.content_type(), "uploading image for classification");

        let form = Form::new().part("file", image_part(image, "classify")?);
        let response = self
            .client
            .post(url)
            .multipart(form)
            .timeout(self.config.classification_timeout())
            .send()
            .await
            .map_err(|e| PipelineError::from_reqwest(e, "classify"))?;
        let body = read_success_body(response, "classify").await?;

        serde_json::from_str(&body).map_err(|e| malformed("classify", url, e))
    }
}

#[async_trait]
impl IngestionService for HttpGateway {
    async fn submit_report(
        &self,
        payload: &IngestionPayload,
        image: &ImageBlob,
    ) -> PipelineResult<()> {
        let url = &self.config.endpoints.ingestion_url;
        let format = self.config.ingestion.format;
        debug!(url = %url, report_id = %payload.report_id, format = %format, "submitting report");

        let request = self
            .client
            .post(url)
            .timeout(self.config.submission_timeout());

        let request = match format {
            IngestionFormat::JsonReference => request.json(payload),
            IngestionFormat::JsonInline => {
                let mut inline = payload.clone();
                inline.image_base64 = Some(STANDARD.encode(image.bytes()));
                request.json(&inline)
            }
            IngestionFormat::Multipart => {
                let report = serde_json::to_string(payload)?;
                let report_part = Part::text(report)
                    .mime_str("application/json")
                    .map_err(|e| PipelineError::from_reqwest(e, "submit_report"))?;
                let form = Form::new()
                    .part("file", image_part(image, "submit_report")?)
                    .part("report", report_part);
                request.multipart(form)
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::from_reqwest(e, "submit_report"))?;
        read_success_body(response, "submit_report").await?;
        Ok(())
    }
}

fn image_part(image: &ImageBlob, operation: &str) -> PipelineResult<Part> {
    Part::bytes(image.bytes().to_vec())
        .file_name(image.upload_name())
        .mime_str(image.content_type())
        .map_err(|e| PipelineError::from_reqwest(e, operation))
}

/// Return the body of a 2xx response, or a service error carrying the status
/// and a truncated body for anything else.
async fn read_success_body(response: Response, operation: &str) -> PipelineResult<String> {
    let status = response.status();
    let endpoint = response.url().to_string();
    let body = response
        .text()
        .await
        .map_err(|e| PipelineError::from_reqwest(e, operation))?;

    if !status.is_success() {
        let snippet: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
        let mut context = ErrorContext::new(operation)
            .with_endpoint(endpoint)
            .with_status(status.as_u16())
            .with_details(snippet);
        if status.is_server_error() {
            context = context.retryable();
        }
        return Err(PipelineError::service_with_context(
            format!("HTTP {}", status),
            context,
        ));
    }

    Ok(body)
}

fn malformed(operation: &str, endpoint: &str, err: serde_json::Error) -> PipelineError {
    PipelineError::service_with_context(
        format!("Malformed response: {}", err),
        ErrorContext::new(operation).with_endpoint(endpoint),
    )
}
