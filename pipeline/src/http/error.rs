//! Error responses of the stub services.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, PipelineError};
use crate::remote::LocalFailure;

const MALFORMED_BODY: &str = "{\"unexpected\": ";

/// JSON body of every non-2xx stub response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StubErrorBody {
    pub detail: String,
}

#[derive(Debug)]
pub enum StubError {
    /// Malformed request (bad multipart, non-image upload, bad JSON)
    BadRequest(String),
    /// Failure produced by the scripted backend
    Pipeline(PipelineError),
}

impl IntoResponse for StubError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            StubError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            // A scripted malformed payload: 200 with a body that is not the contract.
            StubError::Pipeline(err) if LocalFailure::is_malformed(&err) => {
                return (StatusCode::OK, MALFORMED_BODY).into_response();
            }
            StubError::Pipeline(err) => {
                let status = match (err.context().status, err.kind()) {
                    (Some(code), _) => StatusCode::from_u16(code)
                        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                    (None, ErrorKind::Transport) => StatusCode::SERVICE_UNAVAILABLE,
                    (None, ErrorKind::Validation) => StatusCode::UNPROCESSABLE_ENTITY,
                    (None, _) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.message().to_string())
            }
        };

        (status, Json(StubErrorBody { detail })).into_response()
    }
}

impl From<PipelineError> for StubError {
    fn from(err: PipelineError) -> Self {
        StubError::Pipeline(err)
    }
}

impl From<axum::extract::multipart::MultipartError> for StubError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        StubError::BadRequest(format!("Invalid multipart body: {}", err))
    }
}
