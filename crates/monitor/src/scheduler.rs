//! The scheduled poll / score / alert loop.
//!
//! [`Monitor::run`] drives an unbounded sequence of cycles until its
//! [`CancellationToken`] fires. Each cycle:
//!
//! 1. fans out one fetch per entity (bounded by a semaphore, each fetch
//!    under its own timeout) and waits for all of them,
//! 2. scores every fetched observation independently,
//! 3. evaluates the alert predicate and dispatches at most one alert,
//! 4. appends the cycle batch to the store,
//! 5. reports to the metrics sink, then sleeps the full interval.
//!
//! Fetch and scoring failures drop the affected entity for the cycle.
//! Alert and storage failures are retried by the [`RetryPolicy`]; when the
//! retries run out the cycle records the failure and the loop carries on.
//! Cancellation is only observed between cycles, so a cycle that has
//! started always finishes.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use secwatch_core::alert::{AlertEvent, AlertPredicate};
use secwatch_core::collaborators::{
    AlertOutcome, CycleReport, DataSource, MetricsSink, Notifier, ObservationStore,
    PersistOutcome, Scorer,
};
use secwatch_core::error::{FetchError, ScoreError};
use secwatch_core::observation::{CycleBatch, Observation, ScoredObservation};
use secwatch_core::retry::RetryPolicy;
use secwatch_core::types::{CycleId, EntityId};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Loop tuning shared by every cycle.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Sleep between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Maximum concurrent fetches.
    pub fetch_concurrency: usize,
    /// Upper bound on a single entity fetch.
    pub fetch_timeout: Duration,
    /// Retry policy for storage appends and alert delivery.
    pub retry: RetryPolicy,
    pub predicate: AlertPredicate,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            fetch_concurrency: 32,
            fetch_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            predicate: AlertPredicate::default(),
        }
    }
}

/// The I/O the loop orchestrates.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn DataSource>,
    pub scorer: Arc<dyn Scorer>,
    pub store: Arc<dyn ObservationStore>,
    pub notifier: Arc<dyn Notifier>,
    pub metrics: Arc<dyn MetricsSink>,
}

/// A long-lived poll / score / alert loop over a fixed entity set.
pub struct Monitor {
    entities: Vec<EntityId>,
    settings: MonitorSettings,
    io: Collaborators,
    next_cycle: CycleId,
}

impl Monitor {
    pub fn new(entities: Vec<EntityId>, settings: MonitorSettings, io: Collaborators) -> Self {
        Self {
            entities,
            settings,
            io,
            next_cycle: 1,
        }
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Run cycles until `cancel` fires. Returns the number of completed cycles.
    ///
    /// Cancellation is checked before each cycle and while sleeping between
    /// cycles; a running cycle is never interrupted.
    pub async fn run(&mut self, cancel: CancellationToken) -> u64 {
        tracing::info!(
            entities = self.entities.len(),
            interval_secs = self.settings.interval.as_secs(),
            fetch_concurrency = self.settings.fetch_concurrency,
            scorer = self.io.scorer.name(),
            channel = self.io.notifier.channel(),
            "Monitor loop started",
        );

        let mut completed = 0u64;
        loop {
            if cancel.is_cancelled() {
                break;
            }

            self.run_cycle().await;
            completed += 1;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        tracing::info!(cycles = completed, "Monitor loop stopped");
        completed
    }

    /// Execute one full cycle and report what happened.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let cycle = self.next_cycle;
        self.next_cycle += 1;
        let started = Instant::now();

        let (observations, fetch_failures) = self.fetch_all(cycle).await;
        let (scored, score_failures) = self.score_all(&observations);
        let failing = scored.iter().filter(|s| s.is_failing()).count();

        let alert = match self.settings.predicate.evaluate(cycle, &scored) {
            Some(event) => self.dispatch_alert(&event).await,
            None => AlertOutcome::NotTriggered,
        };

        let batch = CycleBatch {
            cycle,
            observations,
            scored,
        };
        let persist = self.persist(&batch).await;

        let report = CycleReport {
            cycle,
            entities: self.entities.len(),
            fetched: batch.observations.len(),
            fetch_failures,
            scored: batch.scored.len(),
            score_failures,
            failing,
            alert,
            persist,
            duration: started.elapsed(),
        };

        self.io.metrics.record_cycle(&report, &batch);

        tracing::info!(
            cycle,
            entities = report.entities,
            fetched = report.fetched,
            fetch_failures,
            scored = report.scored,
            failing,
            alert = ?report.alert,
            persist = ?report.persist,
            duration_ms = report.duration.as_millis() as u64,
            "Cycle complete",
        );

        report
    }

    /// Fetch every entity concurrently and wait for all of them.
    ///
    /// Returns the successful observations (ordered by entity id) and the
    /// number of failed fetches.
    async fn fetch_all(&self, cycle: CycleId) -> (Vec<Observation>, usize) {
        if self.entities.is_empty() {
            return (Vec::new(), 0);
        }

        let semaphore = Arc::new(Semaphore::new(self.settings.fetch_concurrency.max(1)));
        let timeout = self.settings.fetch_timeout;
        let mut tasks = JoinSet::new();

        for entity_id in &self.entities {
            let entity_id = entity_id.clone();
            let source = Arc::clone(&self.io.source);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                // The semaphore is never closed, so acquisition only waits.
                let _permit = semaphore.acquire_owned().await.ok();
                let result = match tokio::time::timeout(timeout, source.fetch(&entity_id, cycle)).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout {
                        entity_id: entity_id.clone(),
                        timeout_secs: timeout.as_secs(),
                    }),
                };
                (entity_id, result)
            });
        }

        let mut observations = Vec::with_capacity(self.entities.len());
        let mut failures = 0usize;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(observation))) => observations.push(observation),
                Ok((entity_id, Err(e))) => {
                    failures += 1;
                    tracing::warn!(cycle, entity_id = %entity_id, error = %e, "Fetch failed, skipping entity");
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(cycle, error = %e, "Fetch task aborted, skipping entity");
                }
            }
        }

        observations.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        (observations, failures)
    }

    /// Score each observation independently. Failures (including a
    /// panicking scorer) drop the observation from the scored set.
    fn score_all(&self, observations: &[Observation]) -> (Vec<ScoredObservation>, usize) {
        let mut scored = Vec::with_capacity(observations.len());
        let mut failures = 0usize;

        for observation in observations {
            let outcome = catch_unwind(AssertUnwindSafe(|| self.io.scorer.score(observation)));
            match outcome {
                Ok(Ok(classification)) => scored.push(ScoredObservation {
                    observation: observation.clone(),
                    classification,
                }),
                Ok(Err(e)) => {
                    failures += 1;
                    log_score_failure(observation, &e);
                }
                Err(_) => {
                    failures += 1;
                    tracing::warn!(
                        entity_id = %observation.entity_id,
                        scorer = self.io.scorer.name(),
                        "Scorer panicked, skipping observation",
                    );
                }
            }
        }

        (scored, failures)
    }

    async fn dispatch_alert(&self, alert: &AlertEvent) -> AlertOutcome {
        let notifier = &self.io.notifier;
        tracing::info!(
            cycle = alert.cycle,
            channel = notifier.channel(),
            entities = alert.entity_ids.len(),
            reason = %alert.reason,
            "Alert triggered",
        );

        match self
            .settings
            .retry
            .run("alert delivery", move |_| notifier.send(alert))
            .await
        {
            Ok(()) => AlertOutcome::Sent,
            Err(_) => AlertOutcome::Failed,
        }
    }

    async fn persist(&self, batch: &CycleBatch) -> PersistOutcome {
        if batch.is_empty() {
            tracing::debug!(cycle = batch.cycle, "Nothing fetched, skipping persistence");
            return PersistOutcome::Skipped;
        }

        let store = &self.io.store;
        match self
            .settings
            .retry
            .run("batch append", move |_| store.append(batch))
            .await
        {
            Ok(()) => PersistOutcome::Stored,
            Err(_) => PersistOutcome::Failed,
        }
    }
}

fn log_score_failure(observation: &Observation, error: &ScoreError) {
    tracing::warn!(
        entity_id = %observation.entity_id,
        error = %error,
        "Scoring failed, skipping observation",
    );
}
