//! Route table.

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::handlers::{
    analytics_handler, approve_handler, audit_trail_handler, authorize_handler, bulk_handler,
    confirmation_handler, create_relation_handler, expire_handler, get_relation_handler,
    health_handler, list_organizations_handler, list_relations_handler, overview_handler,
    pending_approvals_handler, probe_handler, record_access_handler, record_error_handler,
    scope_handler, set_status_handler,
};
use crate::state::AppState;

/// Build the HTTP router.
///
/// Provides:
/// - GET  /health
/// - POST /relations, GET /relations
/// - POST /relations/bulk, POST /relations/bulk/confirmation
/// - POST /relations/expire
/// - GET  /relations/:id
/// - POST /relations/:id/approve, PATCH /relations/:id/status
/// - GET  /relations/:id/{probe,analytics,scope,authorize,audit}
/// - POST /relations/:id/{access,errors}
/// - GET  /organizations, /organizations/:org_id/pending-approvals,
///   /organizations/:org_id/relations/overview
pub fn router(state: AppState) -> Router {
    let relations = Router::new()
        .route("/", post(create_relation_handler).get(list_relations_handler))
        .route("/bulk", post(bulk_handler))
        .route("/bulk/confirmation", post(confirmation_handler))
        .route("/expire", post(expire_handler))
        .route("/:id", get(get_relation_handler))
        .route("/:id/approve", post(approve_handler))
        .route("/:id/status", patch(set_status_handler))
        .route("/:id/probe", get(probe_handler))
        .route("/:id/analytics", get(analytics_handler))
        .route("/:id/scope", get(scope_handler))
        .route("/:id/authorize", get(authorize_handler))
        .route("/:id/audit", get(audit_trail_handler))
        .route("/:id/access", post(record_access_handler))
        .route("/:id/errors", post(record_error_handler));

    let organizations = Router::new()
        .route("/", get(list_organizations_handler))
        .route("/:org_id/pending-approvals", get(pending_approvals_handler))
        .route("/:org_id/relations/overview", get(overview_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/relations", relations)
        .nest("/organizations", organizations)
        .with_state(state)
}
