//! In-memory collaborators for driving the monitor loop in tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secwatch_core::alert::{AlertEvent, AlertPredicate};
use secwatch_core::collaborators::{
    CycleReport, DataSource, MetricsSink, Notifier, ObservationStore, Scorer,
};
use secwatch_core::entity::EntityKind;
use secwatch_core::error::{DeliveryError, FetchError, ScoreError, StorageError};
use secwatch_core::observation::{Classification, CycleBatch, Observation};
use secwatch_core::retry::RetryPolicy;
use secwatch_core::types::{CycleId, EntityId, Timestamp};
use secwatch_monitor::scheduler::{Collaborators, Monitor, MonitorSettings};
use secwatch_monitor::scoring::RuleScorer;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// What the fake source does for one entity.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Report the given camera status immediately.
    Status(&'static str),
    /// Report the given status after a delay.
    Delayed(Duration, &'static str),
    /// Report an observation with no fields at all.
    Empty,
    /// Fail with an HTTP error.
    Fail,
    /// Never answer.
    Hang,
}

#[derive(Default)]
pub struct ScriptedSource {
    behaviors: HashMap<EntityId, Behavior>,
    calls: Mutex<Vec<(EntityId, CycleId, Instant)>>,
    cancel_on_fetch: Option<CancellationToken>,
}

impl ScriptedSource {
    pub fn new(behaviors: &[(&str, Behavior)]) -> Self {
        Self {
            behaviors: behaviors
                .iter()
                .map(|(id, b)| (id.to_string(), b.clone()))
                .collect(),
            ..Self::default()
        }
    }

    /// Cancel `token` as soon as any fetch starts.
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_fetch = Some(token);
        self
    }

    pub fn calls(&self) -> Vec<(EntityId, CycleId, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    /// Time of the first fetch in each cycle, in cycle order.
    pub fn cycle_starts(&self) -> Vec<Instant> {
        let mut starts: BTreeMap<CycleId, Instant> = BTreeMap::new();
        for (_, cycle, at) in self.calls() {
            starts
                .entry(cycle)
                .and_modify(|t| *t = (*t).min(at))
                .or_insert(at);
        }
        starts.into_values().collect()
    }
}

fn camera(entity_id: &str, cycle: CycleId, status: &str) -> Observation {
    Observation::new(entity_id, EntityKind::Camera, cycle).with_field("status", status)
}

#[async_trait]
impl DataSource for ScriptedSource {
    async fn fetch(&self, entity_id: &str, cycle: CycleId) -> Result<Observation, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((entity_id.to_string(), cycle, Instant::now()));
        if let Some(token) = &self.cancel_on_fetch {
            token.cancel();
        }

        match self.behaviors.get(entity_id).cloned().unwrap_or(Behavior::Fail) {
            Behavior::Status(status) => Ok(camera(entity_id, cycle, status)),
            Behavior::Delayed(delay, status) => {
                tokio::time::sleep(delay).await;
                Ok(camera(entity_id, cycle, status))
            }
            Behavior::Empty => Ok(Observation::new(entity_id, EntityKind::Camera, cycle)),
            Behavior::Fail => Err(FetchError::BadStatus {
                entity_id: entity_id.to_string(),
                status: 503,
            }),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(FetchError::Transport {
                    entity_id: entity_id.to_string(),
                    reason: "hung".into(),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Delegates to [`RuleScorer`] but panics on one entity.
pub struct PanickingScorer {
    pub panic_on: &'static str,
}

impl Scorer for PanickingScorer {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn score(&self, observation: &Observation) -> Result<Classification, ScoreError> {
        if observation.entity_id == self.panic_on {
            panic!("scorer blew up on {}", observation.entity_id);
        }
        RuleScorer.score(observation)
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Dedups by `(entity_id, observed_at)`, like the Postgres store.
#[derive(Default)]
pub struct RecordingStore {
    committed: Mutex<BTreeMap<(EntityId, Timestamp), Observation>>,
    attempts: AtomicU32,
    /// Attempts that commit their rows and then report failure.
    fail_after_commit: AtomicU32,
    /// Attempts that fail without committing anything.
    fail_before_commit: AtomicU32,
}

impl RecordingStore {
    pub fn failing_after_commit(attempts: u32) -> Self {
        let store = Self::default();
        store.fail_after_commit.store(attempts, Ordering::SeqCst);
        store
    }

    pub fn always_failing() -> Self {
        let store = Self::default();
        store.fail_before_commit.store(u32::MAX, Ordering::SeqCst);
        store
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn committed(&self) -> usize {
        self.committed.lock().unwrap().len()
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl ObservationStore for RecordingStore {
    async fn append(&self, batch: &CycleBatch) -> Result<(), StorageError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if take_one(&self.fail_before_commit) {
            return Err(StorageError::Connection("connection refused".into()));
        }

        {
            let mut committed = self.committed.lock().unwrap();
            for observation in &batch.observations {
                committed
                    .entry((observation.entity_id.clone(), observation.observed_at))
                    .or_insert_with(|| observation.clone());
            }
        }

        if take_one(&self.fail_after_commit) {
            return Err(StorageError::Write("acknowledgement lost".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<AlertEvent>>,
    attempts: AtomicU32,
    failures_left: AtomicU32,
}

impl RecordingNotifier {
    pub fn always_failing() -> Self {
        let notifier = Self::default();
        notifier.failures_left.store(u32::MAX, Ordering::SeqCst);
        notifier
    }

    pub fn sent(&self) -> Vec<AlertEvent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn channel(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, alert: &AlertEvent) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.failures_left) {
            return Err(DeliveryError::Channel {
                channel: "recording",
                reason: "relay unavailable".into(),
            });
        }
        self.sent.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Records reports and optionally cancels the loop after `n` cycles.
#[derive(Default)]
pub struct CountingMetrics {
    reports: Mutex<Vec<CycleReport>>,
    recorded_at: Mutex<Vec<Instant>>,
    stop_after: Option<(usize, CancellationToken)>,
}

impl CountingMetrics {
    pub fn stopping_after(cycles: usize, token: CancellationToken) -> Self {
        Self {
            stop_after: Some((cycles, token)),
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<CycleReport> {
        self.reports.lock().unwrap().clone()
    }

    /// When each cycle finished, in cycle order.
    pub fn recorded_at(&self) -> Vec<Instant> {
        self.recorded_at.lock().unwrap().clone()
    }
}

impl MetricsSink for CountingMetrics {
    fn record_cycle(&self, report: &CycleReport, _batch: &CycleBatch) {
        self.recorded_at.lock().unwrap().push(Instant::now());
        let mut reports = self.reports.lock().unwrap();
        reports.push(report.clone());
        if let Some((n, token)) = &self.stop_after {
            if reports.len() >= *n {
                token.cancel();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub source: Arc<ScriptedSource>,
    pub store: Arc<RecordingStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub metrics: Arc<CountingMetrics>,
    pub scorer: Arc<dyn Scorer>,
    pub settings: MonitorSettings,
}

impl Harness {
    pub fn new(source: ScriptedSource) -> Self {
        Self {
            source: Arc::new(source),
            store: Arc::new(RecordingStore::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            metrics: Arc::new(CountingMetrics::default()),
            scorer: Arc::new(RuleScorer),
            settings: MonitorSettings {
                interval: Duration::from_secs(60),
                fetch_concurrency: 4,
                fetch_timeout: Duration::from_secs(10),
                retry: RetryPolicy::default(),
                predicate: AlertPredicate::default(),
            },
        }
    }

    pub fn with_store(mut self, store: RecordingStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    pub fn with_notifier(mut self, notifier: RecordingNotifier) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn with_metrics(mut self, metrics: CountingMetrics) -> Self {
        self.metrics = Arc::new(metrics);
        self
    }

    pub fn with_scorer(mut self, scorer: impl Scorer + 'static) -> Self {
        self.scorer = Arc::new(scorer);
        self
    }

    pub fn monitor(&self, entities: &[&str]) -> Monitor {
        Monitor::new(
            entities.iter().map(|e| e.to_string()).collect(),
            self.settings.clone(),
            Collaborators {
                source: self.source.clone(),
                scorer: self.scorer.clone(),
                store: self.store.clone(),
                notifier: self.notifier.clone(),
                metrics: self.metrics.clone(),
            },
        )
    }
}
