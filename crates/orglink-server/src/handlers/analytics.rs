//! Usage recording and analytics endpoints.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use orglink_core::models::analytics::{AccessEvent, ErrorEvent, RecordAccess, RecordError};
use orglink_relations::{AnalyticsWindow, RelationAnalytics};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    /// `all` (default) or `<n>d`.
    pub window: Option<String>,
}

/// POST /relations/:id/access
pub async fn record_access_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<RecordAccess>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AccessEvent>)> {
    let Path(id) = path?;
    let Json(input) = body?;
    let event = state.analytics.record_access(id, input).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// POST /relations/:id/errors
pub async fn record_error_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<RecordError>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ErrorEvent>)> {
    let Path(id) = path?;
    let Json(input) = body?;
    let event = state.analytics.record_error(id, input).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /relations/:id/analytics?window=
pub async fn analytics_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<WindowQuery>, QueryRejection>,
) -> ApiResult<Json<RelationAnalytics>> {
    let Path(id) = path?;
    let Query(query) = query?;
    let window: AnalyticsWindow = query.window.as_deref().unwrap_or_default().parse()?;
    Ok(Json(state.analytics.summarize(id, window).await?))
}
