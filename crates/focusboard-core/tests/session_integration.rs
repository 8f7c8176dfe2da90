//! Integration tests for the session lifecycle.
//!
//! Drives a session through full pomodoro cycles against an on-disk
//! database and the in-memory remote store, restarting the session between
//! steps the way separate CLI invocations would.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use focusboard_core::{
    Database, Event, Identity, ManualClock, MemoryStore, Phase, PomodoroSession, SessionOptions,
    UserSettings,
};

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn settings() -> UserSettings {
    UserSettings {
        focus_duration: 5,
        short_break_duration: 2,
        long_break_duration: 3,
        long_break_interval: 2,
        ..UserSettings::default()
    }
}

async fn open(
    path: &std::path::Path,
    clock: &ManualClock,
    store: &Arc<MemoryStore>,
) -> PomodoroSession {
    let (session, _) = PomodoroSession::bootstrap(
        SessionOptions {
            settings: settings(),
            ..SessionOptions::default()
        },
        Box::new(Database::open_at(path).unwrap()),
        Arc::new(clock.clone()),
        Some(Identity::new("u1", store.clone())),
    )
    .await
    .unwrap();
    session
}

#[tokio::test]
async fn test_cycle_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("focusboard.db");
    let clock = ManualClock::new(t0());
    let store = Arc::new(MemoryStore::new());

    // Invocation 1: add a task and start focusing.
    let mut s = open(&db, &clock, &store).await;
    s.add_task("chapter one").await.unwrap();
    s.start().unwrap();
    drop(s);

    // Invocation 2, two seconds later: still running.
    clock.advance(Duration::seconds(2));
    let mut s = open(&db, &clock, &store).await;
    assert!(s.is_running());
    assert_eq!(s.machine().remaining_seconds(), 3);

    // Keep ticking in this process until focus completes.
    let mut completion = None;
    for _ in 0..3 {
        clock.advance(Duration::seconds(1));
        if let Some(event) = s.tick().unwrap() {
            completion = Some(event);
        }
    }
    assert!(matches!(
        completion,
        Some(Event::IntervalCompleted {
            phase: Phase::Focus,
            next_phase: Phase::ShortBreak,
            ..
        })
    ));
    let report = s.flush().await.unwrap();
    assert_eq!(report.pending, 0);
    drop(s);

    let records = store.intervals();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].start_time, t0());
    assert_eq!(records[0].end_time, t0() + Duration::seconds(5));
    assert_eq!(store.tasks()[0].completed_pomodoros, 1);

    // Invocation 3: the short break is waiting, skip it and the next focus.
    let mut s = open(&db, &clock, &store).await;
    assert_eq!(s.machine().phase(), Phase::ShortBreak);
    assert_eq!(s.machine().remaining_seconds(), 2);
    s.skip().unwrap();
    s.start().unwrap();
    clock.advance(Duration::seconds(1));
    let event = s.skip().unwrap();
    assert!(matches!(event, Event::IntervalCompleted { next_phase: Phase::LongBreak, .. }));
    s.flush().await.unwrap();
    drop(s);

    // Skipped-before-start break logged nothing; the partial focus did.
    let phases: Vec<Phase> = store.intervals().iter().map(|r| r.phase).collect();
    assert_eq!(phases, [Phase::Focus, Phase::Focus]);
    assert_eq!(store.tasks()[0].completed_pomodoros, 2);
}

#[tokio::test]
async fn test_offline_writes_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("focusboard.db");
    let clock = ManualClock::new(t0());
    let store = Arc::new(MemoryStore::new());

    let mut s = open(&db, &clock, &store).await;
    store.set_offline(true);
    s.start().unwrap();
    clock.advance(Duration::seconds(1));
    s.skip().unwrap();
    let report = s.flush().await.unwrap();
    assert_eq!((report.failed, report.pending), (1, 1));
    drop(s);

    // Still offline: the startup drain fails and the entry stays queued.
    let s = open(&db, &clock, &store).await;
    assert_eq!(s.outbox().len(), 1);
    assert_eq!(s.outbox().entries().next().unwrap().attempts, 2);
    drop(s);

    // Back online: restarting delivers it before anything else.
    store.set_offline(false);
    let s = open(&db, &clock, &store).await;
    assert!(s.outbox().is_empty());
    assert_eq!(store.intervals().len(), 1);
}
