//! Domain value types shared by the capture and overlay flows.
//!
//! - [`geo`]: coordinates and scored risk observations
//! - [`prediction`]: ranked classification labels
//! - [`incident`]: incident category and the animal type catalog
//! - [`image`]: the owned image blob attached to a draft

pub mod geo;
pub mod image;
pub mod incident;
pub mod prediction;

pub use geo::{GeoPoint, RiskPoint};
pub use image::ImageBlob;
pub use incident::{AnimalType, IncidentCategory};
pub use prediction::{sort_predictions, Prediction};
