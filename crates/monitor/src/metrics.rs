//! Prometheus metrics for the monitor loop.
//!
//! [`MonitorMetrics`] owns its own [`Registry`] so each process (and each
//! test) gets an isolated set of collectors. It implements
//! [`MetricsSink`]; the HTTP layer renders it with [`MonitorMetrics::render`].

use std::sync::RwLock;

use prometheus::{Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use secwatch_core::collaborators::{AlertOutcome, CycleReport, MetricsSink, PersistOutcome};
use secwatch_core::metric_names as names;
use secwatch_core::observation::CycleBatch;

use crate::sources::health::{gauge_for, INCIDENTS_FIELD};

pub struct MonitorMetrics {
    registry: Registry,
    cycles: IntCounter,
    fetches: IntCounter,
    fetch_failures: IntCounter,
    scored: IntCounter,
    score_failures: IntCounter,
    alerts_sent: IntCounter,
    alert_failures: IntCounter,
    persist_failures: IntCounter,
    failing_entities: IntGauge,
    cycle_duration: Gauge,
    cctv_offline: IntGauge,
    access_control_failures: IntGauge,
    last_report: RwLock<Option<CycleReport>>,
}

impl MonitorMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let c = IntCounter::new(name, help)?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };
        let int_gauge = |name: &str, help: &str| -> Result<IntGauge, prometheus::Error> {
            let g = IntGauge::new(name, help)?;
            registry.register(Box::new(g.clone()))?;
            Ok(g)
        };

        let cycles = counter(names::CYCLES_TOTAL, "Completed monitor cycles")?;
        let fetches = counter(names::FETCHES_TOTAL, "Entity fetches attempted")?;
        let fetch_failures = counter(names::FETCH_FAILURES_TOTAL, "Entity fetches that failed or timed out")?;
        let scored = counter(names::SCORED_TOTAL, "Observations classified")?;
        let score_failures = counter(names::SCORE_FAILURES_TOTAL, "Observations the scorer rejected")?;
        let alerts_sent = counter(names::ALERTS_SENT_TOTAL, "Alerts delivered")?;
        let alert_failures = counter(names::ALERT_FAILURES_TOTAL, "Alerts that exhausted their retries")?;
        let persist_failures = counter(names::PERSIST_FAILURES_TOTAL, "Cycle batches that could not be stored")?;
        let failing_entities = int_gauge(names::FAILING_ENTITIES, "Entities classified failing in the last cycle")?;
        let cctv_offline = int_gauge(names::CCTV_OFFLINE, "Offline CCTV readings in the health window")?;
        let access_control_failures = int_gauge(
            names::ACCESS_CONTROL_FAILURES,
            "Denied door accesses in the health window",
        )?;

        let cycle_duration = Gauge::new(names::CYCLE_DURATION_SECONDS, "Duration of the last cycle")?;
        registry.register(Box::new(cycle_duration.clone()))?;

        Ok(Self {
            registry,
            cycles,
            fetches,
            fetch_failures,
            scored,
            score_failures,
            alerts_sent,
            alert_failures,
            persist_failures,
            failing_entities,
            cycle_duration,
            cctv_offline,
            access_control_failures,
            last_report: RwLock::new(None),
        })
    }

    /// Render every collector in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles.get()
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().ok().and_then(|r| r.clone())
    }

    fn health_gauge(&self, name: &str) -> Option<&IntGauge> {
        match name {
            names::CCTV_OFFLINE => Some(&self.cctv_offline),
            names::ACCESS_CONTROL_FAILURES => Some(&self.access_control_failures),
            _ => None,
        }
    }
}

impl MetricsSink for MonitorMetrics {
    fn record_cycle(&self, report: &CycleReport, batch: &CycleBatch) {
        self.cycles.inc();
        self.fetches.inc_by(report.entities as u64);
        self.fetch_failures.inc_by(report.fetch_failures as u64);
        self.scored.inc_by(report.scored as u64);
        self.score_failures.inc_by(report.score_failures as u64);
        match report.alert {
            AlertOutcome::Sent => self.alerts_sent.inc(),
            AlertOutcome::Failed => self.alert_failures.inc(),
            AlertOutcome::NotTriggered => {}
        }
        if report.persist == PersistOutcome::Failed {
            self.persist_failures.inc();
        }
        self.failing_entities.set(report.failing as i64);
        self.cycle_duration.set(report.duration.as_secs_f64());

        for observation in &batch.observations {
            let gauge = gauge_for(&observation.entity_id).and_then(|name| self.health_gauge(name));
            if let (Some(gauge), Some(value)) = (gauge, observation.number(INCIDENTS_FIELD)) {
                gauge.set(value as i64);
            }
        }

        if let Ok(mut last) = self.last_report.write() {
            *last = Some(report.clone());
        }
    }
}
