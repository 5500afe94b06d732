//! OrgLink Server — HTTP surface of the inter-organization relation
//! service.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod sweeper;

pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use router::router;
pub use state::AppState;
pub use sweeper::spawn_expiry_sweeper;
