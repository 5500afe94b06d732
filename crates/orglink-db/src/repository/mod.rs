//! SurrealDB repository implementations.

mod access_log;
mod audit;
mod error_log;
mod relation;

pub use access_log::SurrealAccessLogRepository;
pub use audit::SurrealAuditLogRepository;
pub use error_log::SurrealErrorLogRepository;
pub use relation::SurrealRelationRepository;
