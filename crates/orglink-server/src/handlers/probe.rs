use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
};
use orglink_relations::ProbeReport;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::state::AppState;

/// GET /relations/:id/probe
///
/// Always 200 for an existing relation; stage failures are reported in
/// the body, never as an HTTP error.
pub async fn probe_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ProbeReport>> {
    let Path(id) = path?;
    Ok(Json(state.probe.probe(id).await?))
}
