//! Router for the stub services.
//!
//! Serves the classification, risk and ingestion contracts on one origin,
//! under the same paths the default configuration points at.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::StubState;

pub const CLASSIFICATION_PATH: &str = "/predict_animal";
pub const RISK_PATH: &str = "/risk_map";
pub const INGESTION_PATH: &str = "/reports";

/// Create the stub router with all routes and middleware.
pub fn create_router(state: StubState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::health_check))
        .route(RISK_PATH, get(handlers::get_risk_map))
        .route(CLASSIFICATION_PATH, post(handlers::predict_animal))
        .route(INGESTION_PATH, post(handlers::submit_report))
        // Phone photos exceed axum's 2 MB default.
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
