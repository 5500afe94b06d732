//! Organization directory entry.
//!
//! Organizations are owned by an external catalog. The relation
//! subsystem only reads them to validate ids and render partners.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSummary {
    pub id: String,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub org_type: String,
}
