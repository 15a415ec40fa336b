//! Maps [`EngineError`] onto HTTP status codes and a `{code, message}`
//! JSON envelope, the way the teacher's `AppError` mapped its three
//! variants onto 404/400/500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use orchestra_core::EngineError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject_id: Option<String>,
}

/// Newtype so this crate can implement a foreign trait on a foreign
/// type; handlers return `Result<_, ApiError>` and `?` the engine's own
/// error straight through via `From`.
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = match &err {
            EngineError::ClarifyError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::DecomposeError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::WireError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::NoMatchAndNoSynthesis { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::CycleError => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::TemplateRefError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::BlockInputError { .. } => StatusCode::BAD_REQUEST,
            EngineError::BlockOutputError { .. } => StatusCode::BAD_GATEWAY,
            EngineError::BlockTimeoutError { .. } => StatusCode::GATEWAY_TIMEOUT,
            EngineError::BlockRuntimeError { .. } => StatusCode::BAD_GATEWAY,
            EngineError::StoreError(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = ErrorBody { code: err.code(), message: err.to_string(), subject_id: err.subject_id().map(String::from) };
        (status, Json(body)).into_response()
    }
}
