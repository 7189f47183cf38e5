use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{GeoPoint, IncidentCategory, Prediction};

// =========================================================
// Risk Service
// =========================================================

/// Query string of `GET <risk-endpoint>?lat=<float>&lng=<float>`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskQuery {
    pub lat: f64,
    pub lng: f64,
}

impl From<GeoPoint> for RiskQuery {
    fn from(center: GeoPoint) -> Self {
        Self {
            lat: center.lat(),
            lng: center.lng(),
        }
    }
}

/// One element of the risk service's JSON array, before range checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskPointDto {
    pub lat: f64,
    pub lng: f64,
    pub risk_score: f64,
    #[serde(default)]
    pub reason: String,
}

// =========================================================
// Classification Service
// =========================================================

/// Response body of `POST <classification-endpoint>`.
///
/// A missing `predictions` key means "no classification available".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResponse {
    #[serde(default)]
    pub predictions: Option<Vec<Prediction>>,
}

// =========================================================
// Ingestion Service
// =========================================================

/// Serialized incident report sent to the ingestion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionPayload {
    /// Stable across retries of the same draft
    pub report_id: Uuid,
    /// Lowercase hex SHA-256 of the image bytes
    pub image_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_file_name: Option<String>,
    /// Chosen animal type; `None` when the user left it blank
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animal_type: Option<String>,
    pub category: IncidentCategory,
    pub location: GeoPoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_prediction: Option<Prediction>,
    pub reported_at: DateTime<Utc>,
    /// Inline image, only for the `json_inline` wire format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
}

// =========================================================
// Health
// =========================================================

/// Body of `GET <service-base>/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
