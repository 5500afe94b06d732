//! Bulk operation endpoints.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::HeaderMap,
};
use orglink_relations::{BulkAction, BulkReport, BulkRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::actor_from;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConfirmationRequest {
    pub action: BulkAction,
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationResponse {
    pub action: BulkAction,
    pub confirmation_token: String,
}

/// POST /relations/bulk
///
/// Request-level problems answer 4xx; per-item failures are listed in the
/// 200 report.
pub async fn bulk_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<BulkRequest>, JsonRejection>,
) -> ApiResult<Json<BulkReport>> {
    let actor = actor_from(&headers)?;
    let Json(request) = body?;
    Ok(Json(state.bulk.apply(request, &actor).await?))
}

/// POST /relations/bulk/confirmation
pub async fn confirmation_handler(
    State(state): State<AppState>,
    body: Result<Json<ConfirmationRequest>, JsonRejection>,
) -> ApiResult<Json<ConfirmationResponse>> {
    let Json(request) = body?;
    Ok(Json(ConfirmationResponse {
        action: request.action,
        confirmation_token: state.bulk.issue_confirmation(request.action, &request.ids),
    }))
}
