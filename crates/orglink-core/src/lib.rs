//! OrgLink Core — domain models, errors and repository traits for
//! inter-organization data-sharing relations.

pub mod error;
pub mod external;
pub mod models;
pub mod repository;
