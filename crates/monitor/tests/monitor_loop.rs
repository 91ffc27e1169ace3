mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use common::{Behavior, CountingMetrics, Harness, PanickingScorer, RecordingNotifier, RecordingStore, ScriptedSource};
use secwatch_core::alert::AlertPredicate;
use secwatch_core::collaborators::{AlertOutcome, PersistOutcome};
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn all_fetches_failing_raises_nothing_and_stores_nothing() {
    let harness = Harness::new(ScriptedSource::new(&[
        ("CAM_001", Behavior::Fail),
        ("CAM_002", Behavior::Fail),
    ]));
    let mut monitor = harness.monitor(&["CAM_001", "CAM_002"]);

    let first = monitor.run_cycle().await;
    assert_eq!(first.fetched, 0);
    assert_eq!(first.fetch_failures, 2);
    assert_eq!(first.alert, AlertOutcome::NotTriggered);
    assert_eq!(first.persist, PersistOutcome::Skipped);
    assert_eq!(harness.notifier.attempts(), 0);
    assert_eq!(harness.store.attempts(), 0);

    let second = monitor.run_cycle().await;
    assert_eq!(second.cycle, first.cycle + 1);
}

#[tokio::test(start_paused = true)]
async fn scored_never_exceeds_fetched_never_exceeds_entities() {
    let harness = Harness::new(ScriptedSource::new(&[
        ("CAM_001", Behavior::Status("online")),
        ("CAM_002", Behavior::Status("offline")),
        ("CAM_003", Behavior::Empty),
        ("CAM_004", Behavior::Fail),
    ]));
    let mut monitor = harness.monitor(&["CAM_001", "CAM_002", "CAM_003", "CAM_004"]);

    let report = monitor.run_cycle().await;
    assert_eq!(report.entities, 4);
    assert_eq!(report.fetched, 3);
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.scored, 2);
    assert_eq!(report.score_failures, 1);
    assert_eq!(report.failing, 1);
    assert!(report.scored <= report.fetched && report.fetched <= report.entities);

    // Unscorable observations are still persisted.
    assert_eq!(report.persist, PersistOutcome::Stored);
    assert_eq!(harness.store.committed(), 3);
}

#[tokio::test(start_paused = true)]
async fn replayed_append_does_not_duplicate_records() {
    let harness = Harness::new(ScriptedSource::new(&[
        ("CAM_001", Behavior::Status("online")),
        ("CAM_002", Behavior::Status("online")),
    ]))
    .with_store(RecordingStore::failing_after_commit(1));
    let mut monitor = harness.monitor(&["CAM_001", "CAM_002"]);

    let report = monitor.run_cycle().await;
    assert_eq!(report.persist, PersistOutcome::Stored);
    assert_eq!(harness.store.attempts(), 2);
    assert_eq!(harness.store.committed(), 2);
}

#[tokio::test(start_paused = true)]
async fn alert_delivery_exhaustion_fails_the_cycle_not_the_loop() {
    let cancel = CancellationToken::new();
    let harness = Harness::new(ScriptedSource::new(&[("CAM_001", Behavior::Status("offline"))]))
        .with_notifier(RecordingNotifier::always_failing())
        .with_metrics(CountingMetrics::stopping_after(2, cancel.clone()));
    let mut monitor = harness.monitor(&["CAM_001"]);

    let cycles = monitor.run(cancel).await;
    assert_eq!(cycles, 2);

    let reports = harness.metrics.reports();
    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert_eq!(report.alert, AlertOutcome::Failed);
        assert_eq!(report.persist, PersistOutcome::Stored);
    }
    // Exactly max_attempts tries per cycle.
    assert_eq!(harness.notifier.attempts(), 6);
    assert!(harness.notifier.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn storage_exhaustion_is_reported_and_loop_continues() {
    let cancel = CancellationToken::new();
    let harness = Harness::new(ScriptedSource::new(&[("CAM_001", Behavior::Status("online"))]))
        .with_store(RecordingStore::always_failing())
        .with_metrics(CountingMetrics::stopping_after(2, cancel.clone()));
    let mut monitor = harness.monitor(&["CAM_001"]);

    assert_eq!(monitor.run(cancel).await, 2);
    assert_eq!(harness.store.attempts(), 6);
    assert_eq!(harness.store.committed(), 0);
    assert!(harness
        .metrics
        .reports()
        .iter()
        .all(|r| r.persist == PersistOutcome::Failed));
}

#[tokio::test(start_paused = true)]
async fn cycle_starts_are_spaced_by_at_least_the_interval() {
    let cancel = CancellationToken::new();
    let mut harness = Harness::new(ScriptedSource::new(&[(
        "CAM_001",
        Behavior::Delayed(Duration::from_secs(3), "online"),
    )]))
    .with_metrics(CountingMetrics::stopping_after(3, cancel.clone()));
    harness.settings.interval = Duration::from_secs(10);
    let mut monitor = harness.monitor(&["CAM_001"]);

    assert_eq!(monitor.run(cancel).await, 3);

    let starts = harness.source.cycle_starts();
    assert_eq!(starts.len(), 3);
    for pair in starts.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(10));
    }
}

#[tokio::test(start_paused = true)]
async fn timed_out_entity_is_dropped_and_alert_covers_the_rest() {
    let harness = Harness::new(ScriptedSource::new(&[
        ("CAM_00A", Behavior::Status("offline")),
        ("CAM_00B", Behavior::Hang),
    ]));
    let mut monitor = harness.monitor(&["CAM_00A", "CAM_00B"]);

    let report = monitor.run_cycle().await;
    assert_eq!(report.fetched, 1);
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.alert, AlertOutcome::Sent);

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].entity_ids, vec!["CAM_00A".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn count_predicate_fires_only_on_failing_entities() {
    let harness = Harness::new(ScriptedSource::new(&[
        ("CAM_001", Behavior::Status("online")),
        ("CAM_002", Behavior::Status("online")),
        ("CAM_003", Behavior::Status("online")),
    ]));
    let report = harness.monitor(&["CAM_001", "CAM_002", "CAM_003"]).run_cycle().await;
    assert_eq!(report.alert, AlertOutcome::NotTriggered);
    assert!(harness.notifier.sent().is_empty());

    let harness = Harness::new(ScriptedSource::new(&[
        ("CAM_001", Behavior::Status("online")),
        ("CAM_002", Behavior::Status("offline")),
        ("CAM_003", Behavior::Status("online")),
    ]));
    let report = harness.monitor(&["CAM_001", "CAM_002", "CAM_003"]).run_cycle().await;
    assert_eq!(report.alert, AlertOutcome::Sent);

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].entity_ids, vec!["CAM_002".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn rate_predicate_needs_enough_failing() {
    let mut harness = Harness::new(ScriptedSource::new(&[
        ("CAM_001", Behavior::Status("offline")),
        ("CAM_002", Behavior::Status("online")),
        ("CAM_003", Behavior::Status("online")),
        ("CAM_004", Behavior::Status("online")),
    ]));
    harness.settings.predicate = AlertPredicate::min_rate(0.5).unwrap();

    let report = harness
        .monitor(&["CAM_001", "CAM_002", "CAM_003", "CAM_004"])
        .run_cycle()
        .await;
    assert_eq!(report.failing, 1);
    assert_eq!(report.alert, AlertOutcome::NotTriggered);
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_fetch_completes_the_cycle_then_stops() {
    let cancel = CancellationToken::new();
    let harness = Harness::new(
        ScriptedSource::new(&[
            ("CAM_001", Behavior::Delayed(Duration::from_secs(2), "offline")),
            ("CAM_002", Behavior::Status("online")),
        ])
        .cancelling(cancel.clone()),
    );
    let mut monitor = harness.monitor(&["CAM_001", "CAM_002"]);

    assert_eq!(monitor.run(cancel).await, 1);

    let reports = harness.metrics.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].fetched, 2);
    assert_eq!(reports[0].scored, 2);
    assert_eq!(reports[0].alert, AlertOutcome::Sent);
    assert_eq!(reports[0].persist, PersistOutcome::Stored);
    assert_eq!(harness.store.committed(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancelled_before_start_runs_no_cycles() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let harness = Harness::new(ScriptedSource::new(&[("CAM_001", Behavior::Status("online"))]));

    assert_eq!(harness.monitor(&["CAM_001"]).run(cancel).await, 0);
    assert!(harness.source.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_entity_set_is_a_quiet_cycle() {
    let harness = Harness::new(ScriptedSource::default());
    let report = harness.monitor(&[]).run_cycle().await;

    assert_eq!(report.entities, 0);
    assert_eq!(report.fetched, 0);
    assert_eq!(report.alert, AlertOutcome::NotTriggered);
    assert_eq!(report.persist, PersistOutcome::Skipped);
}

#[tokio::test(start_paused = true)]
async fn empty_entity_set_still_sleeps_the_full_interval() {
    let cancel = CancellationToken::new();
    let mut harness = Harness::new(ScriptedSource::default())
        .with_metrics(CountingMetrics::stopping_after(2, cancel.clone()));
    harness.settings.interval = Duration::from_secs(30);
    let mut monitor = harness.monitor(&[]);

    assert_eq!(monitor.run(cancel).await, 2);

    let finished = harness.metrics.recorded_at();
    assert_eq!(finished.len(), 2);
    assert!(finished[1] - finished[0] >= Duration::from_secs(30));
    assert!(harness.source.calls().is_empty());
    assert_eq!(harness.store.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn panicking_scorer_drops_only_that_observation() {
    let harness = Harness::new(ScriptedSource::new(&[
        ("CAM_001", Behavior::Status("offline")),
        ("CAM_002", Behavior::Status("offline")),
    ]))
    .with_scorer(PanickingScorer { panic_on: "CAM_001" });

    let report = harness.monitor(&["CAM_001", "CAM_002"]).run_cycle().await;
    assert_eq!(report.scored, 1);
    assert_eq!(report.score_failures, 1);

    let sent = harness.notifier.sent();
    assert_matches!(sent.as_slice(), [event] if event.entity_ids == vec!["CAM_002".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn fetches_respect_concurrency_cap() {
    let ids: Vec<String> = (1..=8).map(|i| format!("CAM_{i:03}")).collect();
    let behaviors: Vec<(&str, Behavior)> = ids
        .iter()
        .map(|id| (id.as_str(), Behavior::Delayed(Duration::from_secs(1), "online")))
        .collect();
    let mut harness = Harness::new(ScriptedSource::new(&behaviors));
    harness.settings.fetch_concurrency = 2;

    let entity_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let started = tokio::time::Instant::now();
    let report = harness.monitor(&entity_refs).run_cycle().await;

    assert_eq!(report.fetched, 8);
    // 8 one-second fetches, two at a time.
    assert!(started.elapsed() >= Duration::from_secs(4));
}
