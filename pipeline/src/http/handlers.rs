//! Handlers implementing the three external service contracts.
//!
//! Each handler parses the request the way the real service expects it and
//! delegates to the scripted [`LocalServices`](crate::remote::LocalServices).

use axum::{
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    Json,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::error::StubError;
use super::state::StubState;
use crate::api::{ClassificationResponse, HealthResponse, IngestionPayload, RiskPointDto, RiskQuery};
use crate::error::PipelineError;
use crate::models::ImageBlob;
use crate::remote::{ClassificationService, IngestionService, RiskService};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, StubError>;

/// Body of an accepted report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportAccepted {
    pub status: String,
    pub report_id: Uuid,
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /
pub async fn health_check(State(state): State<StubState>) -> HandlerResult<HealthResponse> {
    if !state.services.is_healthy() {
        return Err(PipelineError::transport("service marked unhealthy").into());
    }
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

// =============================================================================
// Risk
// =============================================================================

/// GET /risk_map?lat=<float>&lng=<float>
pub async fn get_risk_map(
    State(state): State<StubState>,
    Query(query): Query<RiskQuery>,
) -> HandlerResult<Vec<RiskPointDto>> {
    let points = state.services.fetch_risk_points(query).await?;
    debug!(lat = query.lat, lng = query.lng, points = points.len(), "served risk map");
    Ok(Json(points))
}

// =============================================================================
// Classification
// =============================================================================

/// POST /predict_animal
///
/// Multipart body with an image in the `file` field.
pub async fn predict_animal(
    State(state): State<StubState>,
    mut multipart: Multipart,
) -> HandlerResult<ClassificationResponse> {
    let mut image = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        image = Some(read_image_field(field).await?);
    }
    let image = image.ok_or_else(|| StubError::BadRequest("Missing file field".to_string()))?;

    let response = state.services.classify(&image).await?;
    Ok(Json(response))
}

// =============================================================================
// Ingestion
// =============================================================================

/// POST /reports
///
/// Accepts a JSON report (optionally with `imageBase64`) or a multipart form
/// with `file` and `report` parts.
pub async fn submit_report(
    State(state): State<StubState>,
    request: Request,
) -> Result<(StatusCode, Json<ReportAccepted>), StubError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    let (payload, image) = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| StubError::BadRequest(e.body_text()))?;
        read_report_form(multipart).await?
    } else {
        let Json(payload) = Json::<IngestionPayload>::from_request(request, &state)
            .await
            .map_err(|e| StubError::BadRequest(e.body_text()))?;
        let image = match &payload.image_base64 {
            Some(encoded) => {
                let bytes = STANDARD
                    .decode(encoded)
                    .map_err(|e| StubError::BadRequest(format!("Invalid imageBase64: {}", e)))?;
                Some(ImageBlob::new(bytes))
            }
            None => None,
        };
        (payload, image)
    };

    if let Some(image) = &image {
        if image.image_ref() != payload.image_ref {
            return Err(StubError::BadRequest(
                "imageRef does not match the uploaded image".to_string(),
            ));
        }
    }

    let image = image.unwrap_or_else(|| ImageBlob::new(Vec::new()));
    state.services.submit_report(&payload, &image).await?;
    info!(report_id = %payload.report_id, category = %payload.category, "report accepted");

    Ok((
        StatusCode::CREATED,
        Json(ReportAccepted {
            status: "accepted".to_string(),
            report_id: payload.report_id,
        }),
    ))
}

async fn read_report_form(
    mut multipart: Multipart,
) -> Result<(IngestionPayload, Option<ImageBlob>), StubError> {
    let mut payload = None;
    let mut image = None;
    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => image = Some(read_image_field(field).await?),
            Some("report") => {
                let text = field.text().await?;
                let parsed: IngestionPayload = serde_json::from_str(&text)
                    .map_err(|e| StubError::BadRequest(format!("Invalid report part: {}", e)))?;
                payload = Some(parsed);
            }
            _ => {}
        }
    }
    let payload = payload.ok_or_else(|| StubError::BadRequest("Missing report part".to_string()))?;
    Ok((payload, image))
}

/// Read an upload, rejecting anything not declared as an image.
async fn read_image_field(
    field: axum::extract::multipart::Field<'_>,
) -> Result<ImageBlob, StubError> {
    let is_image = field
        .content_type()
        .is_some_and(|mime| mime.starts_with("image/"));
    if !is_image {
        return Err(StubError::BadRequest("File must be an image".to_string()));
    }
    let file_name = field.file_name().map(str::to_string);
    let bytes = field.bytes().await?;

    let image = ImageBlob::new(bytes.to_vec());
    Ok(match file_name {
        Some(name) => image.with_file_name(name),
        None => image,
    })
}
