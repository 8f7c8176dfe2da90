//! Serializable view of the timer and the reload-recovery rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::machine::{Completion, TimerMachine};
use super::phase::{Cadence, Durations, Phase};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub remaining_seconds: u32,
    pub phase: Phase,
    pub running: bool,
    #[serde(default)]
    pub interval_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub interval_end: Option<DateTime<Utc>>,
    /// When the snapshot was written.
    pub saved_at: DateTime<Utc>,
}

/// Outcome of restoring a stored snapshot.
#[derive(Debug, Clone)]
pub struct Restored {
    pub machine: TimerMachine,
    /// Set when the snapshot was written between stamping a completion and
    /// committing it. The caller replays exactly this one completion.
    pub pending: Option<Completion>,
    /// The stored countdown ran out while nobody was ticking; the machine
    /// fell back to the idle default for the stored phase.
    pub expired: bool,
}

impl TimerSnapshot {
    /// Rebuild a machine from this snapshot as seen at `now`.
    ///
    /// A running countdown loses the whole seconds elapsed since `saved_at`.
    /// If that exhausts it, the snapshot is discarded in favour of the idle
    /// default for the stored phase; no completions are replayed for the
    /// time the process was gone.
    pub fn restore(&self, durations: Durations, cadence: Cadence, now: DateTime<Utc>) -> Restored {
        if self.interval_end.is_some() {
            let machine = TimerMachine::from_parts(durations, cadence, self, self.remaining_seconds, false);
            let pending = machine.pending_completion();
            return Restored {
                machine,
                pending,
                expired: false,
            };
        }

        if self.running {
            let elapsed_secs = (now - self.saved_at).num_milliseconds().max(0) / 1000;
            let remaining = i64::from(self.remaining_seconds) - elapsed_secs;
            if remaining <= 0 {
                tracing::info!(
                    phase = %self.phase,
                    elapsed_secs,
                    "stored countdown expired while closed, falling back to idle"
                );
                return Restored {
                    machine: TimerMachine::idle_on(self.phase, durations, cadence),
                    pending: None,
                    expired: true,
                };
            }
            let remaining = u32::try_from(remaining).unwrap_or(u32::MAX);
            return Restored {
                machine: TimerMachine::from_parts(durations, cadence, self, remaining, true),
                pending: None,
                expired: false,
            };
        }

        if self.remaining_seconds == 0 {
            return Restored {
                machine: TimerMachine::idle_on(self.phase, durations, cadence),
                pending: None,
                expired: false,
            };
        }

        Restored {
            machine: TimerMachine::from_parts(durations, cadence, self, self.remaining_seconds, false),
            pending: None,
            expired: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn running_snapshot(remaining: u32) -> TimerSnapshot {
        TimerSnapshot {
            remaining_seconds: remaining,
            phase: Phase::Focus,
            running: true,
            interval_start: Some(t0() - Duration::seconds(60)),
            interval_end: None,
            saved_at: t0(),
        }
    }

    #[test]
    fn running_snapshot_loses_elapsed_seconds() {
        let restored = running_snapshot(100).restore(
            Durations::default(),
            Cadence::default(),
            t0() + Duration::seconds(30),
        );
        assert!(!restored.expired);
        assert!(restored.pending.is_none());
        assert!(restored.machine.is_running());
        assert_eq!(restored.machine.remaining_seconds(), 70);
        assert_eq!(
            restored.machine.interval_start(),
            Some(t0() - Duration::seconds(60))
        );
    }

    #[test]
    fn partial_seconds_are_floored() {
        let restored = running_snapshot(100).restore(
            Durations::default(),
            Cadence::default(),
            t0() + Duration::milliseconds(30_999),
        );
        assert_eq!(restored.machine.remaining_seconds(), 70);
    }

    #[test]
    fn exhausted_snapshot_falls_back_to_idle_default() {
        let restored = running_snapshot(100).restore(
            Durations::default(),
            Cadence::default(),
            t0() + Duration::seconds(150),
        );
        assert!(restored.expired);
        assert!(!restored.machine.is_running());
        assert_eq!(restored.machine.phase(), Phase::Focus);
        assert_eq!(restored.machine.remaining_seconds(), 25 * 60);
        assert!(restored.machine.interval_start().is_none());
    }

    #[test]
    fn exactly_exhausted_is_expired() {
        let restored = running_snapshot(100).restore(
            Durations::default(),
            Cadence::default(),
            t0() + Duration::seconds(100),
        );
        assert!(restored.expired);
    }

    #[test]
    fn paused_snapshot_is_taken_verbatim() {
        let snapshot = TimerSnapshot {
            running: false,
            phase: Phase::ShortBreak,
            ..running_snapshot(42)
        };
        let restored = snapshot.restore(
            Durations::default(),
            Cadence::default(),
            t0() + Duration::hours(3),
        );
        assert!(!restored.machine.is_running());
        assert_eq!(restored.machine.phase(), Phase::ShortBreak);
        assert_eq!(restored.machine.remaining_seconds(), 42);
    }

    #[test]
    fn stamped_end_is_handed_back_once() {
        let snapshot = TimerSnapshot {
            remaining_seconds: 0,
            running: false,
            interval_end: Some(t0()),
            ..running_snapshot(0)
        };
        let restored = snapshot.restore(Durations::default(), Cadence::default(), t0());
        let pending = restored.pending.expect("pending completion");
        assert_eq!(pending.phase, Phase::Focus);
        assert_eq!(pending.ended_at, t0());
        assert!(!pending.skipped);
    }

    #[test]
    fn json_shape_uses_snake_case_keys() {
        let json = serde_json::to_value(running_snapshot(5)).unwrap();
        assert_eq!(json["remaining_seconds"], 5);
        assert_eq!(json["phase"], "focus");
        assert_eq!(json["running"], true);
        assert!(json["interval_end"].is_null());
        assert!(json.get("saved_at").is_some());
    }
}
