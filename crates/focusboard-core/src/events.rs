use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Phase, TimerState};

/// Every state change in the system produces an Event.
/// The CLI prints them; tests assert on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        phase: Phase,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    TimerPaused {
        phase: Phase,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    TimerReset {
        phase: Phase,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    /// Manual phase change; the abandoned phase is not logged.
    PhaseSwitched {
        from: Phase,
        to: Phase,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    /// A phase ran out or was skipped and the completion protocol ran.
    IntervalCompleted {
        phase: Phase,
        started_at: Option<DateTime<Utc>>,
        ended_at: DateTime<Utc>,
        skipped: bool,
        next_phase: Phase,
        /// Active task credited with a focus completion.
        task: Option<String>,
        auto_started: bool,
    },
    DurationsChanged {
        phase: Phase,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: TimerState,
        phase: Phase,
        remaining_secs: u32,
        total_secs: u32,
        focus_streak: u32,
        long_break_interval: u32,
        title: String,
        at: DateTime<Utc>,
    },
}
