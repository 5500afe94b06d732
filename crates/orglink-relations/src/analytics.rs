//! Relation usage analytics.
//!
//! Access and error events are append-only and recorded independently of
//! each other. All statistics are derived on read from the event logs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use orglink_core::error::{OrgLinkError, OrgLinkResult};
use orglink_core::models::analytics::{
    AccessEvent, CreateAccessEvent, CreateErrorEvent, ErrorEvent, RecordAccess, RecordError,
};
use orglink_core::repository::{AccessLogRepository, ErrorLogRepository, RelationRepository};
use serde::{Serialize, Serializer};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RelationConfig;

/// Time span covered by a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalyticsWindow {
    #[default]
    All,
    /// The last `n` days up to the time of the request.
    Days(u32),
}

impl AnalyticsWindow {
    /// Earliest instant inside the window. Saturates at the minimum
    /// representable time instead of overflowing.
    pub fn start(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::All => None,
            Self::Days(days) => Some(days_before(now, days)),
        }
    }

    /// Reject day windows wider than `max_days`.
    pub fn ensure_within(self, max_days: u32) -> OrgLinkResult<Self> {
        match self {
            Self::Days(days) if days > max_days => Err(OrgLinkError::validation(format!(
                "window '{self}' exceeds the maximum of {max_days} days"
            ))),
            _ => Ok(self),
        }
    }
}

fn days_before(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(days))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl fmt::Display for AnalyticsWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Days(days) => write!(f, "{days}d"),
        }
    }
}

impl FromStr for AnalyticsWindow {
    type Err = OrgLinkError;

    /// Accepts `all` or `<n>d`, e.g. `7d`, `30d`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.strip_suffix('d')
            .and_then(|n| n.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .map(Self::Days)
            .ok_or_else(|| {
                OrgLinkError::validation(format!("invalid window '{s}', expected 'all' or '<n>d'"))
            })
    }
}

impl Serialize for AnalyticsWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStat {
    pub date: NaiveDate,
    pub total: u64,
    pub successes: u64,
    pub avg_response_time: f64,
}

/// Derived statistics for one relation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationAnalytics {
    pub relation_id: Uuid,
    pub window: AnalyticsWindow,
    pub total_access: u64,
    pub success_count: u64,
    /// `success_count / total_access`, `0.0` without events.
    pub success_rate: f64,
    /// Mean response time in milliseconds.
    pub avg_response_time: f64,
    /// Events inside the rolling monthly window, independent of `window`.
    pub monthly_access: u64,
    /// One entry per calendar day (UTC) of the window, including empty days.
    pub daily_stats: Vec<DailyStat>,
    pub data_type_stats: BTreeMap<String, u64>,
    /// Event counts by hour of day (UTC), index 0 through 23.
    pub peak_hours: Vec<u64>,
    pub error_count: u64,
    pub failed_attempts: u64,
    pub access_count: u64,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

struct Tally {
    total: u64,
    successes: u64,
    response_ms: u64,
}

impl Tally {
    fn new() -> Self {
        Self {
            total: 0,
            successes: 0,
            response_ms: 0,
        }
    }

    fn add(&mut self, event: &AccessEvent) {
        self.total += 1;
        self.successes += u64::from(event.success);
        self.response_ms += event.response_time_ms;
    }

    fn avg_response(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.response_ms as f64 / self.total as f64
        }
    }

    fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successes as f64 / self.total as f64
        }
    }
}

/// Aggregate already loaded events. `accesses` and `errors` may extend
/// beyond `window`; anything older than the window start is ignored.
pub fn summarize_events(
    relation_id: Uuid,
    window: AnalyticsWindow,
    now: DateTime<Utc>,
    monthly_window_days: u32,
    accesses: &[AccessEvent],
    errors: &[ErrorEvent],
) -> RelationAnalytics {
    let start = window.start(now);
    let in_window = |at: DateTime<Utc>| start.is_none_or(|s| at >= s);
    let month_start = days_before(now, monthly_window_days);

    let mut overall = Tally::new();
    let mut daily: BTreeMap<NaiveDate, Tally> = BTreeMap::new();
    let mut data_type_stats = BTreeMap::new();
    let mut peak_hours = vec![0u64; 24];
    let mut monthly_access = 0;

    for event in accesses {
        if event.occurred_at >= month_start {
            monthly_access += 1;
        }
        if !in_window(event.occurred_at) {
            continue;
        }
        overall.add(event);
        daily
            .entry(event.occurred_at.date_naive())
            .or_insert_with(Tally::new)
            .add(event);
        *data_type_stats.entry(event.data_type.clone()).or_insert(0) += 1;
        peak_hours[event.occurred_at.hour() as usize] += 1;
    }

    let first_day = start
        .map(|s| s.date_naive())
        .or_else(|| daily.keys().next().copied());
    let last_day = daily
        .keys()
        .next_back()
        .copied()
        .map_or(now.date_naive(), |d| d.max(now.date_naive()));
    let daily_stats = first_day
        .map(|first| {
            first
                .iter_days()
                .take_while(|d| *d <= last_day)
                .map(|date| match daily.get(&date) {
                    Some(t) => DailyStat {
                        date,
                        total: t.total,
                        successes: t.successes,
                        avg_response_time: t.avg_response(),
                    },
                    None => DailyStat {
                        date,
                        total: 0,
                        successes: 0,
                        avg_response_time: 0.0,
                    },
                })
                .collect()
        })
        .unwrap_or_default();

    let windowed_errors = errors.iter().filter(|e| in_window(e.occurred_at));
    let (error_count, failed_attempts) =
        windowed_errors.fold((0u64, 0u64), |(n, attempts), e| {
            (n + 1, attempts + u64::from(e.attempts))
        });

    RelationAnalytics {
        relation_id,
        window,
        total_access: overall.total,
        success_count: overall.successes,
        success_rate: overall.success_rate(),
        avg_response_time: overall.avg_response(),
        monthly_access,
        daily_stats,
        data_type_stats,
        peak_hours,
        error_count,
        failed_attempts,
        access_count: 0,
        last_accessed_at: None,
    }
}

/// Records relation usage and derives statistics from it.
pub struct AnalyticsAggregator<R: RelationRepository, L: AccessLogRepository, E: ErrorLogRepository>
{
    relations: R,
    access_log: L,
    error_log: E,
    monthly_window_days: u32,
    max_window_days: u32,
    conflict_retries: u32,
}

impl<R: RelationRepository, L: AccessLogRepository, E: ErrorLogRepository>
    AnalyticsAggregator<R, L, E>
{
    pub fn new(relations: R, access_log: L, error_log: E, config: &RelationConfig) -> Self {
        Self {
            relations,
            access_log,
            error_log,
            monthly_window_days: config.monthly_window_days,
            max_window_days: config.max_window_days,
            conflict_retries: config.conflict_retries,
        }
    }

    /// Append an access event and advance the relation's counters in one
    /// write. A transaction conflict is retried up to `conflict_retries`
    /// times before surfacing as `Conflict`.
    pub async fn record_access(
        &self,
        relation_id: Uuid,
        input: RecordAccess,
    ) -> OrgLinkResult<AccessEvent> {
        if input.action.trim().is_empty() {
            return Err(OrgLinkError::validation("action is required"));
        }
        if input.data_type.trim().is_empty() {
            return Err(OrgLinkError::validation("dataType is required"));
        }
        self.relations.get_by_id(relation_id).await?;

        let create = CreateAccessEvent {
            relation_id,
            action: input.action,
            success: input.success,
            response_time_ms: input.response_time_ms,
            data_type: input.data_type,
            occurred_at: input.occurred_at.unwrap_or_else(Utc::now),
        };
        let mut attempt = 0;
        let event = loop {
            match self.access_log.append(create.clone()).await {
                Ok(event) => break event,
                Err(err) if err.is_retryable() && attempt < self.conflict_retries => {
                    attempt += 1;
                    warn!(relation_id = %relation_id, attempt, "Access write conflict, retrying");
                    tokio::task::yield_now().await;
                }
                Err(err) => return Err(err),
            }
        };

        debug!(
            relation_id = %relation_id,
            action = %event.action,
            success = event.success,
            "Recorded relation access"
        );
        Ok(event)
    }

    /// Append to the error log. Does not touch the access counters.
    pub async fn record_error(
        &self,
        relation_id: Uuid,
        input: RecordError,
    ) -> OrgLinkResult<ErrorEvent> {
        if input.description.trim().is_empty() {
            return Err(OrgLinkError::validation("description is required"));
        }
        if input.attempts == 0 {
            return Err(OrgLinkError::validation("attempts must be at least 1"));
        }
        self.relations.get_by_id(relation_id).await?;

        let event = self
            .error_log
            .append(CreateErrorEvent {
                relation_id,
                description: input.description,
                attempts: input.attempts,
                occurred_at: Utc::now(),
            })
            .await?;
        debug!(relation_id = %relation_id, attempts = event.attempts, "Recorded relation error");
        Ok(event)
    }

    pub async fn summarize(
        &self,
        relation_id: Uuid,
        window: AnalyticsWindow,
    ) -> OrgLinkResult<RelationAnalytics> {
        self.summarize_at(relation_id, window, Utc::now()).await
    }

    /// Summary as of `now`. A missing relation fails the whole call, as
    /// does a day window wider than `max_window_days`.
    pub async fn summarize_at(
        &self,
        relation_id: Uuid,
        window: AnalyticsWindow,
        now: DateTime<Utc>,
    ) -> OrgLinkResult<RelationAnalytics> {
        let window = window.ensure_within(self.max_window_days)?;
        let relation = self.relations.get_by_id(relation_id).await?;

        let month_start = days_before(now, self.monthly_window_days);
        let fetch_since = window.start(now).map(|s| s.min(month_start));

        let accesses = self
            .access_log
            .list_by_relation(relation_id, fetch_since)
            .await?;
        let errors = self
            .error_log
            .list_by_relation(relation_id, window.start(now))
            .await?;

        let mut summary = summarize_events(
            relation_id,
            window,
            now,
            self.monthly_window_days,
            &accesses,
            &errors,
        );
        summary.access_count = relation.access_count;
        summary.last_accessed_at = relation.last_accessed_at;
        Ok(summary)
    }
}
