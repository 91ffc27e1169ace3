//! Collaborator traits orchestrated by the monitor loop.
//!
//! The loop owns none of the I/O itself: it fans out over a [`DataSource`],
//! classifies with a [`Scorer`], dispatches through a [`Notifier`], appends
//! to an [`ObservationStore`] and reports to a [`MetricsSink`]. Each trait
//! has a concrete production implementation and in-memory fakes in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::alert::AlertEvent;
use crate::error::{DeliveryError, FetchError, ScoreError, StorageError};
use crate::observation::{Classification, CycleBatch, Observation};
use crate::types::CycleId;

/// Produces one observation per entity per cycle.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self, entity_id: &str, cycle: CycleId) -> Result<Observation, FetchError>;
}

/// Append-only sink for cycle batches.
///
/// Appending the same batch twice must not duplicate committed records
/// (deduplication by entity id and observation timestamp).
#[async_trait]
pub trait ObservationStore: Send + Sync {
    async fn append(&self, batch: &CycleBatch) -> Result<(), StorageError>;
}

/// Delivers an alert. Redelivery of the same event is allowed.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short channel name for logs, e.g. `email`.
    fn channel(&self) -> &'static str;

    async fn send(&self, alert: &AlertEvent) -> Result<(), DeliveryError>;
}

/// Classifies a single observation. Must be pure and fast.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, observation: &Observation) -> Result<Classification, ScoreError>;
}

/// Fire-and-forget metrics. Implementations must never fail the caller.
pub trait MetricsSink: Send + Sync {
    fn record_cycle(&self, report: &CycleReport, batch: &CycleBatch);
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: CycleId,
    pub entities: usize,
    pub fetched: usize,
    pub fetch_failures: usize,
    pub scored: usize,
    pub score_failures: usize,
    pub failing: usize,
    pub alert: AlertOutcome,
    pub persist: PersistOutcome,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

/// What happened to the cycle's alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertOutcome {
    /// Predicate did not fire (or there was nothing to score).
    #[default]
    NotTriggered,
    Sent,
    /// Delivery failed on every attempt.
    Failed,
}

/// What happened to the cycle's batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistOutcome {
    /// Nothing was fetched, so nothing was written.
    #[default]
    Skipped,
    Stored,
    /// Storage failed on every attempt.
    Failed,
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}
