//! Canonical metric names exported by the monitor's `/metrics` endpoint.
//!
//! Counters are cumulative over the process lifetime; gauges are overwritten
//! by every completed cycle.

/// Completed monitor cycles.
pub const CYCLES_TOTAL: &str = "secwatch_cycles_total";

/// Entity fetches attempted, successful or not.
pub const FETCHES_TOTAL: &str = "secwatch_fetches_total";

/// Failed entity fetches (timeouts, bad status, malformed payloads).
pub const FETCH_FAILURES_TOTAL: &str = "secwatch_fetch_failures_total";

/// Observations that received a classification.
pub const SCORED_TOTAL: &str = "secwatch_scored_observations_total";

/// Observations the scorer could not classify.
pub const SCORE_FAILURES_TOTAL: &str = "secwatch_score_failures_total";

/// Alerts delivered to the notification channel.
pub const ALERTS_SENT_TOTAL: &str = "secwatch_alerts_sent_total";

/// Alerts abandoned after exhausting retries.
pub const ALERT_FAILURES_TOTAL: &str = "secwatch_alert_failures_total";

/// Cycle batches abandoned after exhausting storage retries.
pub const PERSIST_FAILURES_TOTAL: &str = "secwatch_persist_failures_total";

/// Failing entities in the latest completed cycle.
pub const FAILING_ENTITIES: &str = "secwatch_failing_entities";

/// Wall-clock duration of the latest completed cycle, in seconds.
pub const CYCLE_DURATION_SECONDS: &str = "secwatch_cycle_duration_seconds";

/// Offline camera readings in the trailing health window.
pub const CCTV_OFFLINE: &str = "secwatch_cctv_offline";

/// Denied door accesses in the trailing health window.
pub const ACCESS_CONTROL_FAILURES: &str = "secwatch_access_control_failures";
