//! HTTP error mapping.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use orglink_core::error::OrgLinkError;
use orglink_core::models::relation::RelationStatus;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] OrgLinkError),

    /// Malformed request: undecodable body, path or query string.
    #[error("{0}")]
    BadRequest(String),
}

/// Error body returned by every endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_status: Option<RelationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::BadRequest(message) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: "validation_error",
                        message,
                        current_status: None,
                        retryable: None,
                    }),
                )
                    .into_response();
            }
            ApiError::Domain(err) => err,
        };

        let code = err.code();
        let (status, message, current_status, retryable) = match &err {
            OrgLinkError::Validation { message } => {
                (StatusCode::BAD_REQUEST, message.clone(), None, None)
            }
            OrgLinkError::AuthorizationDenied { reason } => {
                (StatusCode::FORBIDDEN, reason.clone(), None, None)
            }
            OrgLinkError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string(), None, None),
            OrgLinkError::IllegalTransition { current, .. } => (
                StatusCode::CONFLICT,
                err.to_string(),
                Some(*current),
                None,
            ),
            OrgLinkError::Conflict { message, .. } => {
                (StatusCode::CONFLICT, message.clone(), None, Some(true))
            }
            OrgLinkError::Database(detail) | OrgLinkError::Internal(detail) => {
                error!(error = %detail, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                    None,
                    None,
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: code,
                message,
                current_status,
                retryable,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
