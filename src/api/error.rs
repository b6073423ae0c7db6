use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::pipeline::PipelineError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

fn pipeline_response(e: PipelineError) -> (StatusCode, String) {
    match e {
        PipelineError::SizeExceeded { .. } => (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()),
        PipelineError::ProbeFailed(_) | PipelineError::NoVideoStream => {
            tracing::warn!("Rejected upload: {}", e);
            (
                StatusCode::BAD_REQUEST,
                format!("Couldn't read video: {}", e),
            )
        }
        PipelineError::StagingFailed(_)
        | PipelineError::RemuxFailed { .. }
        | PipelineError::PublishFailed(_) => {
            // Tool diagnostics stay in the logs
            tracing::error!("Pipeline failed at {}: {}", e.stage(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Couldn't process video ({} failed)", e.stage()),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::Pipeline(e) => pipeline_response(e),
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
