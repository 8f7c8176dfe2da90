mod clock;
mod machine;
mod phase;
mod snapshot;

pub use clock::{Clock, ClockDriver, ManualClock, SystemClock, Tick};
pub use machine::{Completion, TimerMachine, TimerState};
pub use phase::{
    format_clock, Cadence, Durations, Phase, FOCUS_DEFAULT_SECS, LONG_BREAK_DEFAULT_SECS,
    LONG_BREAK_INTERVAL_DEFAULT, SHORT_BREAK_DEFAULT_SECS,
};
pub use snapshot::{Restored, TimerSnapshot};
