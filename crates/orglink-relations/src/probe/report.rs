use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Success,
    Warning,
    Error,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReport {
    pub status: StageStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl StageReport {
    fn new(status: StageStatus, message: impl Into<String>, latency: Option<Duration>) -> Self {
        Self {
            status,
            message: message.into(),
            timestamp: Utc::now(),
            latency_ms: latency.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }

    pub fn success(message: impl Into<String>, latency: Option<Duration>) -> Self {
        Self::new(StageStatus::Success, message, latency)
    }

    pub fn warning(message: impl Into<String>, latency: Option<Duration>) -> Self {
        Self::new(StageStatus::Warning, message, latency)
    }

    pub fn error(message: impl Into<String>, latency: Option<Duration>) -> Self {
        Self::new(StageStatus::Error, message, latency)
    }

    pub fn skipped(reason: &str) -> Self {
        Self::new(StageStatus::Skipped, format!("skipped: {reason}"), None)
    }
}

/// Composite result, one record per stage in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub relation_id: Uuid,
    pub overall: StageStatus,
    pub connection_test: StageReport,
    pub authentication_test: StageReport,
    pub permissions_test: StageReport,
    pub data_access_test: StageReport,
}

impl ProbeReport {
    /// Build a report from the stages that ran, padding the rest with
    /// `skipped` entries.
    pub fn assemble(
        relation_id: Uuid,
        completed: impl IntoIterator<Item = StageReport>,
        skip_reason: &str,
    ) -> Self {
        let mut stages = completed.into_iter();
        let mut next = || {
            stages
                .next()
                .unwrap_or_else(|| StageReport::skipped(skip_reason))
        };
        let connection_test = next();
        let authentication_test = next();
        let permissions_test = next();
        let data_access_test = next();

        let overall = if [
            &connection_test,
            &authentication_test,
            &permissions_test,
            &data_access_test,
        ]
        .iter()
        .all(|s| s.status == StageStatus::Success)
        {
            StageStatus::Success
        } else if connection_test.status == StageStatus::Error
            || authentication_test.status == StageStatus::Error
        {
            StageStatus::Error
        } else {
            StageStatus::Warning
        };

        Self {
            relation_id,
            overall,
            connection_test,
            authentication_test,
            permissions_test,
            data_access_test,
        }
    }

    pub fn stages(&self) -> [&StageReport; 4] {
        [
            &self.connection_test,
            &self.authentication_test,
            &self.permissions_test,
            &self.data_access_test,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_stages_are_skipped_not_omitted() {
        let report = ProbeReport::assemble(
            Uuid::nil(),
            [StageReport::error("refused", None)],
            "connectivity check failed",
        );
        assert_eq!(report.overall, StageStatus::Error);
        assert_eq!(report.data_access_test.status, StageStatus::Skipped);
        assert!(report.data_access_test.message.contains("connectivity"));
    }

    #[test]
    fn report_serializes_with_stage_keys() {
        let report = ProbeReport::assemble(
            Uuid::nil(),
            [StageReport::success("ok", Some(Duration::from_millis(12)))],
            "x",
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["connectionTest"]["status"], "success");
        assert_eq!(json["connectionTest"]["latencyMs"], 12);
        assert_eq!(json["dataAccessTest"]["status"], "skipped");
        assert!(json["dataAccessTest"].get("latencyMs").is_none());
        assert_eq!(json["overall"], "warning");
    }
}
