//! Access to the external services the pipeline depends on.
//!
//! The pipeline never talks to the network directly; it goes through the
//! traits in [`service`], so the capture and overlay flows can run against
//! the real HTTP services or against in-memory stand-ins.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Pipeline services (overlay fetcher, classification     │
//! │  client, report submission)                             │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service traits (service.rs)                            │
//! │  RiskService / ClassificationService / IngestionService │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────┴──────────────────┐
//!     │ HttpGateway          LocalServices│
//!     │ (reqwest)            (in-memory)  │
//!     └──────────────────────────────────┘
//! ```

pub mod factory;
pub mod http;
pub mod local;
pub mod service;

pub use factory::{RemoteFactory, RemoteType};
pub use http::HttpGateway;
pub use local::{LocalFailure, LocalServices};
pub use service::{ClassificationService, IngestionService, RemoteServices, RiskService};
