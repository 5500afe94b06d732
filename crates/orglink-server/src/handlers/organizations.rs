//! Organization-centric reads.

use axum::{
    Json,
    extract::{Path, State},
};
use orglink_core::external::OrganizationDirectory;
use orglink_core::models::organization::OrganizationSummary;
use orglink_core::models::relation::OrganizationRelation;
use orglink_relations::RelationOverview;

use crate::error::ApiResult;
use crate::state::AppState;

/// GET /organizations
pub async fn list_organizations_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<OrganizationSummary>>> {
    Ok(Json(state.lifecycle.directory().list().await?))
}

/// GET /organizations/:org_id/pending-approvals
///
/// Pending relations still waiting on this organization's approval.
pub async fn pending_approvals_handler(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> ApiResult<Json<Vec<OrganizationRelation>>> {
    Ok(Json(state.lifecycle.pending_approvals(&org_id).await?))
}

/// GET /organizations/:org_id/relations/overview
pub async fn overview_handler(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
) -> ApiResult<Json<RelationOverview>> {
    Ok(Json(state.lifecycle.overview(&org_id).await?))
}
