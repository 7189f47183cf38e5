//! Pipeline services built on top of the remote service traits.
//!
//! - [`risk_overlay`]: fetches and holds the rendered risk point set
//! - [`classification`]: turns a photo into ranked predictions
//! - [`map_renderer`]: projects risk points onto a tiled map scene
//! - [`submission`]: validates and sends completed reports

pub mod classification;
pub mod map_renderer;
pub mod risk_overlay;
pub mod submission;

pub use classification::{normalize_predictions, ClassificationClient, ClassificationOutcome};
pub use map_renderer::{
    popup_text, MapRenderer, MapScene, RiskZone, Severity, Viewport, HIGH_RISK_THRESHOLD,
    RISK_ZONE_RADIUS,
};
pub use risk_overlay::{OverlayRefresh, RiskOverlay};
pub use submission::{ReportSubmitter, SubmissionReceipt};
