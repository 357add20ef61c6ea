use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sea_orm::DbErr;
use serde_json::json;
use tracing::{debug, error};

use crate::leaderboard::SubmissionError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage failure: {0}")]
    Storage(#[from] DbErr),
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::InvalidInput(reason) => ApiError::InvalidInput(reason.to_string()),
            SubmissionError::Storage(e) => ApiError::Storage(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidInput(reason) => {
                debug!(reason = %reason, "Rejecting invalid request");
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Invalid input" })),
                )
                    .into_response()
            }
            ApiError::Storage(e) => {
                error!(error = ?e, "Leaderboard storage failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}
