//! Alert predicate and the per-cycle alert event.
//!
//! The predicate is evaluated once over a whole scored batch and yields at
//! most one [`AlertEvent`] per cycle, listing only the failing entities.
//! Thresholds are explicit: either an absolute count of failing entities or
//! a fraction of the scored batch, never both.

use std::str::FromStr;

use serde::Serialize;

use crate::error::CoreError;
use crate::observation::ScoredObservation;
use crate::types::{CycleId, EntityId, Timestamp};

/// When a scored batch should raise an alert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "threshold", rename_all = "snake_case")]
pub enum AlertPredicate {
    /// Alert when at least `n` observations are failing. `n` is at least 1.
    MinFailingCount(usize),
    /// Alert when the failing fraction of the scored batch is at least `r`,
    /// with `0.0 < r <= 1.0`.
    MinFailingRate(f64),
}

impl Default for AlertPredicate {
    fn default() -> Self {
        Self::MinFailingCount(1)
    }
}

impl AlertPredicate {
    /// Build a count predicate, rejecting a zero threshold (it would alert
    /// on every cycle, including ones with nothing failing).
    pub fn min_count(n: usize) -> Result<Self, CoreError> {
        if n == 0 {
            return Err(CoreError::Validation(
                "failing count threshold must be at least 1".into(),
            ));
        }
        Ok(Self::MinFailingCount(n))
    }

    /// Build a rate predicate with a threshold in `(0.0, 1.0]`.
    pub fn min_rate(r: f64) -> Result<Self, CoreError> {
        if !(r > 0.0 && r <= 1.0) {
            return Err(CoreError::Validation(format!(
                "failing rate threshold must be in (0.0, 1.0], got {r}"
            )));
        }
        Ok(Self::MinFailingRate(r))
    }

    /// Whether `failing` out of `scored` observations crosses the threshold.
    ///
    /// An empty batch never triggers, and neither does a batch with no
    /// failing observations.
    pub fn is_triggered(&self, failing: usize, scored: usize) -> bool {
        if scored == 0 || failing == 0 {
            return false;
        }
        match *self {
            Self::MinFailingCount(n) => failing >= n,
            Self::MinFailingRate(r) => (failing as f64 / scored as f64) >= r,
        }
    }

    /// Evaluate the predicate over a scored batch and build the cycle's
    /// alert if it fires.
    pub fn evaluate(&self, cycle: CycleId, batch: &[ScoredObservation]) -> Option<AlertEvent> {
        let failing: Vec<&ScoredObservation> = batch.iter().filter(|s| s.is_failing()).collect();
        if !self.is_triggered(failing.len(), batch.len()) {
            return None;
        }
        Some(AlertEvent::from_failing(cycle, self.describe(failing.len(), batch.len()), &failing))
    }

    fn describe(&self, failing: usize, scored: usize) -> String {
        match *self {
            Self::MinFailingCount(n) => {
                format!("{failing} of {scored} entities failing (threshold: {n})")
            }
            Self::MinFailingRate(r) => format!(
                "{failing} of {scored} entities failing ({:.0}% >= {:.0}%)",
                failing as f64 / scored as f64 * 100.0,
                r * 100.0
            ),
        }
    }
}

impl FromStr for AlertPredicate {
    type Err = CoreError;

    /// Parse `count:N` or `rate:R`, e.g. `count:1` or `rate:0.25`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = s.trim().split_once(':').ok_or_else(|| {
            CoreError::Validation(format!(
                "alert predicate must be 'count:N' or 'rate:R', got '{s}'"
            ))
        })?;
        match kind.trim() {
            "count" => {
                let n = value.trim().parse::<usize>().map_err(|e| {
                    CoreError::Validation(format!("invalid failing count '{value}': {e}"))
                })?;
                Self::min_count(n)
            }
            "rate" => {
                let r = value.trim().parse::<f64>().map_err(|e| {
                    CoreError::Validation(format!("invalid failing rate '{value}': {e}"))
                })?;
                Self::min_rate(r)
            }
            other => Err(CoreError::Validation(format!(
                "unknown alert predicate kind '{other}'"
            ))),
        }
    }
}

/// A notification raised by one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub cycle: CycleId,
    pub reason: String,
    pub entity_ids: Vec<EntityId>,
    pub raised_at: Timestamp,
    pub subject: String,
    pub body: String,
}

impl AlertEvent {
    fn from_failing(cycle: CycleId, reason: String, failing: &[&ScoredObservation]) -> Self {
        let entity_ids: Vec<EntityId> = failing.iter().map(|s| s.entity_id().to_string()).collect();

        let mut body = format!("ALERT: potential security system failures detected.\n\n{reason}\n\n");
        for scored in failing {
            let obs = &scored.observation;
            let fields = obs
                .fields
                .iter()
                .map(|(k, v)| format!("{k}={}", serde_json::to_string(v).unwrap_or_default()))
                .collect::<Vec<_>>()
                .join(", ");
            body.push_str(&format!(
                "- {} ({}) at {}: score {:.2} [{}]\n",
                obs.entity_id,
                obs.kind,
                obs.observed_at.to_rfc3339(),
                scored.classification.score,
                fields
            ));
        }

        Self {
            cycle,
            subject: format!(
                "Security system failure alert: {} entit{} failing",
                entity_ids.len(),
                if entity_ids.len() == 1 { "y" } else { "ies" }
            ),
            reason,
            entity_ids,
            raised_at: chrono::Utc::now(),
            body,
        }
    }
}
