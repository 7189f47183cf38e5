//! Wire-level Data Transfer Objects.
//!
//! These types describe exactly what crosses the network boundary to the
//! classification, risk and ingestion services. Domain types in
//! [`crate::models`] convert to and from them at the edge, so invariants
//! (coordinate ranges, score ranges) are checked once, on the way in.

pub mod types;

pub use types::{
    ClassificationResponse, HealthResponse, IngestionPayload, RiskPointDto, RiskQuery,
};
