//! HTTP handlers.

pub mod analytics;
pub mod bulk;
pub mod health;
pub mod organizations;
pub mod probe;
pub mod relations;

use axum::http::HeaderMap;
use orglink_core::models::audit::{Actor, ActorKind};
use orglink_core::repository::Pagination;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};

pub use analytics::{analytics_handler, record_access_handler, record_error_handler};
pub use bulk::{bulk_handler, confirmation_handler};
pub use health::health_handler;
pub use organizations::{
    list_organizations_handler, overview_handler, pending_approvals_handler,
};
pub use probe::probe_handler;
pub use relations::{
    approve_handler, audit_trail_handler, authorize_handler, create_relation_handler,
    expire_handler, get_relation_handler, list_relations_handler, scope_handler,
    set_status_handler,
};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_KIND_HEADER: &str = "x-actor-kind";

const ANONYMOUS: &str = "anonymous";
const MAX_PAGE_SIZE: u64 = 200;

/// Resolve the acting identity from request headers. Authentication
/// happens upstream; these headers are trusted as given.
pub(crate) fn actor_from(headers: &HeaderMap) -> ApiResult<Actor> {
    let header = |name: &str| -> ApiResult<Option<String>> {
        headers
            .get(name)
            .map(|v| {
                v.to_str()
                    .map(|s| s.trim().to_string())
                    .map_err(|_| ApiError::BadRequest(format!("{name} is not valid UTF-8")))
            })
            .transpose()
    };

    let id = header(ACTOR_ID_HEADER)?
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| ANONYMOUS.to_string());

    let kind = match header(ACTOR_KIND_HEADER)?.as_deref() {
        None | Some("") | Some("user") => ActorKind::User,
        Some("system") => ActorKind::System,
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "{ACTOR_KIND_HEADER} must be `user` or `system`, got `{other}`"
            )));
        }
    };

    Ok(Actor { id, kind })
}

/// `offset` / `limit` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            offset: self.offset.unwrap_or(defaults.offset),
            limit: self.limit.unwrap_or(defaults.limit).clamp(1, MAX_PAGE_SIZE),
        }
    }
}
