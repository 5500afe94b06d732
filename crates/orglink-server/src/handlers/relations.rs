//! Relation lifecycle endpoints.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use orglink_core::error::OrgLinkError;
use orglink_core::models::audit::AuditLogEntry;
use orglink_core::models::relation::{
    Action, CreateRelationRequest, Direction, OrganizationRelation, RelationStatus, RelationType,
};
use orglink_core::repository::{PaginatedResult, RelationFilter};
use orglink_relations::EffectiveScope;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{PageQuery, actor_from};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRelationsQuery {
    pub org_id: Option<String>,
    pub direction: Option<Direction>,
    /// Comma-separated statuses, e.g. `PENDING,ACTIVE`.
    pub status: Option<String>,
    pub relation_type: Option<RelationType>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    pub org_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: RelationStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub action: Action,
    pub service: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExpireResponse {
    pub expired: Vec<Uuid>,
}

fn parse_statuses(raw: Option<&str>) -> Result<Vec<RelationStatus>, OrgLinkError> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    })
    .unwrap_or_else(|| Ok(Vec::new()))
}

/// POST /relations
pub async fn create_relation_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateRelationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OrganizationRelation>)> {
    let actor = actor_from(&headers)?;
    let Json(request) = body?;
    let relation = state.lifecycle.create(request, &actor).await?;
    Ok((StatusCode::CREATED, Json(relation)))
}

/// GET /relations
pub async fn list_relations_handler(
    State(state): State<AppState>,
    query: Result<Query<ListRelationsQuery>, QueryRejection>,
) -> ApiResult<Json<PaginatedResult<OrganizationRelation>>> {
    let Query(query) = query?;
    let org_id = query
        .org_id
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty());
    if query.direction.is_some() && org_id.is_none() {
        return Err(OrgLinkError::validation("direction requires orgId").into());
    }

    let filter = RelationFilter {
        org_id,
        direction: query.direction,
        statuses: parse_statuses(query.status.as_deref())?,
        relation_type: query.relation_type,
        ..Default::default()
    };
    let pagination = PageQuery {
        offset: query.offset,
        limit: query.limit,
    }
    .pagination();
    let page = state.lifecycle.list(filter, pagination).await?;
    Ok(Json(page))
}

/// GET /relations/:id
pub async fn get_relation_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<OrganizationRelation>> {
    let Path(id) = path?;
    Ok(Json(state.lifecycle.get(id).await?))
}

/// POST /relations/:id/approve
///
/// Records the approval of `orgId`. Approving twice is a no-op; a relation
/// that is no longer pending answers 409 with its current status.
pub async fn approve_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ApproveRequest>, JsonRejection>,
) -> ApiResult<Json<OrganizationRelation>> {
    let actor = actor_from(&headers)?;
    let Path(id) = path?;
    let Json(request) = body?;
    let relation = state.lifecycle.approve(id, &request.org_id, &actor).await?;
    Ok(Json(relation))
}

/// PATCH /relations/:id/status
pub async fn set_status_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<StatusChangeRequest>, JsonRejection>,
) -> ApiResult<Json<OrganizationRelation>> {
    let actor = actor_from(&headers)?;
    let Path(id) = path?;
    let Json(request) = body?;
    let relation = state
        .lifecycle
        .set_status(id, request.status, request.reason.as_deref(), &actor)
        .await?;
    Ok(Json(relation))
}

/// GET /relations/:id/scope
pub async fn scope_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<EffectiveScope>> {
    let Path(id) = path?;
    Ok(Json(state.lifecycle.effective_scope(id).await?))
}

/// GET /relations/:id/authorize?action=&service=
///
/// 200 with the effective scope when the action is allowed, 403 otherwise.
pub async fn authorize_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<AuthorizeQuery>, QueryRejection>,
) -> ApiResult<Json<EffectiveScope>> {
    let Path(id) = path?;
    let Query(query) = query?;
    let scope = state
        .lifecycle
        .authorize(id, query.action, query.service.as_deref())
        .await?;
    Ok(Json(scope))
}

/// GET /relations/:id/audit
pub async fn audit_trail_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<PaginatedResult<AuditLogEntry>>> {
    let Path(id) = path?;
    let Query(page) = query?;
    let trail = state.lifecycle.audit_trail(id, page.pagination()).await?;
    Ok(Json(trail))
}

/// POST /relations/expire
///
/// Runs the expiry sweep immediately under the system actor.
pub async fn expire_handler(State(state): State<AppState>) -> ApiResult<Json<ExpireResponse>> {
    let expired = state.lifecycle.expire_overdue(Utc::now()).await?;
    info!(expired = expired.len(), "Manual expiry sweep finished");
    Ok(Json(ExpireResponse { expired }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_are_comma_separated() {
        assert_eq!(
            parse_statuses(Some("PENDING, ACTIVE,")).unwrap(),
            vec![RelationStatus::Pending, RelationStatus::Active]
        );
        assert!(parse_statuses(None).unwrap().is_empty());
        assert!(parse_statuses(Some("DORMANT")).is_err());
    }
}
