//! Domain models for OrgLink.
//!
//! These are the core types shared across all crates.

pub mod analytics;
pub mod audit;
pub mod notification;
pub mod organization;
pub mod relation;
