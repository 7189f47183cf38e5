use serde::{Deserialize, Serialize};
use std::fmt;

use crate::api::RiskPointDto;
use crate::error::{PipelineError, PipelineResult};

/// WGS84 coordinate pair.
///
/// Constructed only through [`GeoPoint::new`], which enforces
/// `lat ∈ [-90, 90]` and `lng ∈ [-180, 180]`. There are no setters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawGeoPoint {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = PipelineError;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        GeoPoint::new(raw.lat, raw.lng)
    }
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> PipelineResult<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(PipelineError::validation(format!(
                "latitude {} outside [-90, 90]",
                lat
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(PipelineError::validation(format!(
                "longitude {} outside [-180, 180]",
                lng
            )));
        }
        Ok(Self { lat, lng })
    }

    /// Coordinate forced into range; non-finite components become 0.
    pub(crate) fn clamped(lat: f64, lng: f64) -> Self {
        let finite_or_zero = |v: f64| if v.is_finite() { v } else { 0.0 };
        Self {
            lat: finite_or_zero(lat).clamp(-90.0, 90.0),
            lng: finite_or_zero(lng).clamp(-180.0, 180.0),
        }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl fmt::Display for GeoPoint {
    /// Four decimals, the precision shown next to the location button.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lng)
    }
}

/// Scored collision-likelihood observation produced by the risk service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RiskPointDto", into = "RiskPointDto")]
pub struct RiskPoint {
    location: GeoPoint,
    risk_score: f64,
    reason: String,
}

impl RiskPoint {
    pub fn new(
        lat: f64,
        lng: f64,
        risk_score: f64,
        reason: impl Into<String>,
    ) -> PipelineResult<Self> {
        let location = GeoPoint::new(lat, lng)?;
        if !risk_score.is_finite() || !(0.0..=1.0).contains(&risk_score) {
            return Err(PipelineError::validation(format!(
                "riskScore {} outside [0, 1]",
                risk_score
            )));
        }
        Ok(Self {
            location,
            risk_score,
            reason: reason.into(),
        })
    }

    pub fn location(&self) -> GeoPoint {
        self.location
    }

    pub fn lat(&self) -> f64 {
        self.location.lat()
    }

    pub fn lng(&self) -> f64 {
        self.location.lng()
    }

    pub fn risk_score(&self) -> f64 {
        self.risk_score
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl TryFrom<RiskPointDto> for RiskPoint {
    type Error = PipelineError;

    fn try_from(dto: RiskPointDto) -> Result<Self, Self::Error> {
        RiskPoint::new(dto.lat, dto.lng, dto.risk_score, dto.reason)
    }
}

impl From<RiskPoint> for RiskPointDto {
    fn from(point: RiskPoint) -> Self {
        RiskPointDto {
            lat: point.lat(),
            lng: point.lng(),
            risk_score: point.risk_score,
            reason: point.reason,
        }
    }
}
