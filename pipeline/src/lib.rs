//! # EcoGuard Pipeline
//!
//! Incident capture and risk overlay pipeline for wildlife-collision
//! reporting.
//!
//! Drivers report a collision or near miss with a photo, their position and
//! the animal involved; the map shows a live overlay of collision risk
//! computed by an external service. This crate is the part of that system
//! with state, asynchronous coordination and failure handling.
//!
//! ## Features
//!
//! - **Risk Overlay**: fetch risk points around a map center, keep the last
//!   good set when the risk service is down
//! - **Classification**: upload a photo and get ranked species guesses
//! - **Incident Drafts**: a guarded lifecycle from image selection to
//!   submission, safe against stale classification results and teardown
//! - **Map Rendering**: severity buckets, fixed-radius zones, Web Mercator
//!   projection and GeoJSON export
//! - **Submission**: validated, single-request report delivery with
//!   configurable wire format
//!
//! ## Architecture
//!
//! - [`models`]: GeoPoint, RiskPoint, Prediction, incident categories, images
//! - [`api`]: wire DTOs for the external services
//! - [`remote`]: service traits with HTTP and in-memory backends
//! - [`services`]: overlay fetcher, classification client, renderer, submitter
//! - [`draft`]: the incident draft and its capture controller
//! - [`geolocation`]: one-shot device position queries
//! - [`config`] / [`error`]: configuration loading and the error taxonomy
//! - [`http`]: axum stand-ins for the external services (feature `stub-server`)
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ecoguard_pipeline::config::PipelineConfig;
//! use ecoguard_pipeline::draft::IncidentCapture;
//! use ecoguard_pipeline::geolocation::FixedLocator;
//! use ecoguard_pipeline::models::{GeoPoint, ImageBlob, IncidentCategory};
//! use ecoguard_pipeline::remote::HttpGateway;
//!
//! # async fn run() -> ecoguard_pipeline::error::PipelineResult<()> {
//! let config = PipelineConfig::from_env()?;
//! let gateway = Arc::new(HttpGateway::new(&config)?);
//! let capture = IncidentCapture::with_services(gateway, &config);
//!
//! capture.select_image(ImageBlob::new(std::fs::read("deer.jpg").unwrap_or_default()))?;
//! capture.classification_settled().await;
//! capture
//!     .capture_location(&FixedLocator::new(GeoPoint::new(40.71, -74.00)?))
//!     .await?;
//! capture.select_category(IncidentCategory::Roadkill)?;
//! capture.submit().await?;
//! # Ok(())
//! # }
//! ```

// PipelineError carries a structured context for diagnostics
#![allow(clippy::result_large_err)]

pub mod api;
pub mod config;
pub mod draft;
pub mod error;
pub mod geolocation;
pub mod models;
pub mod remote;
pub mod services;

#[cfg(feature = "stub-server")]
pub mod http;

pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError, PipelineResult};
