//! Session state machine.
//!
//! Counts down in whole seconds. The machine owns no thread and no clock:
//! every command takes the current instant, and the caller (the clock driver
//! or a user action) decides when `tick()` happens.
//!
//! ## State Transitions
//!
//! ```text
//! Idle --start--> Running --tick to 0 / skip--> Completed --advance--> Idle | Running
//!   ^                |
//!   +-----pause------+
//! ```
//!
//! `Completed` is momentary: the machine stamps `interval_end`, hands a
//! [`Completion`] to the caller, and stays put until [`TimerMachine::advance`]
//! commits the phase change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::phase::{format_clock, Cadence, Durations, Phase};
use super::snapshot::TimerSnapshot;
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
}

/// A finished interval waiting to be committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub phase: Phase,
    /// `None` when the phase was skipped before it was ever started.
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
    pub skipped: bool,
}

#[derive(Debug, Clone)]
pub struct TimerMachine {
    durations: Durations,
    cadence: Cadence,
    phase: Phase,
    remaining_seconds: u32,
    running: bool,
    interval_start: Option<DateTime<Utc>>,
    interval_end: Option<DateTime<Utc>>,
}

impl TimerMachine {
    /// Idle on focus with the full focus duration.
    pub fn new(durations: Durations, cadence: Cadence) -> Self {
        Self::idle_on(Phase::Focus, durations, cadence)
    }

    pub fn idle_on(phase: Phase, durations: Durations, cadence: Cadence) -> Self {
        Self {
            durations,
            cadence,
            phase,
            remaining_seconds: durations.get(phase),
            running: false,
            interval_start: None,
            interval_end: None,
        }
    }

    pub(crate) fn from_parts(
        durations: Durations,
        cadence: Cadence,
        snapshot: &TimerSnapshot,
        remaining_seconds: u32,
        running: bool,
    ) -> Self {
        Self {
            durations,
            cadence,
            phase: snapshot.phase,
            remaining_seconds,
            running,
            interval_start: snapshot.interval_start,
            interval_end: snapshot.interval_end,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        if self.running {
            TimerState::Running
        } else {
            TimerState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn total_seconds(&self) -> u32 {
        self.durations.get(self.phase)
    }

    pub fn durations(&self) -> Durations {
        self.durations
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn interval_start(&self) -> Option<DateTime<Utc>> {
        self.interval_start
    }

    /// A completion that was stamped but not yet advanced past.
    pub fn pending_completion(&self) -> Option<Completion> {
        self.interval_end.map(|ended_at| Completion {
            phase: self.phase,
            started_at: self.interval_start,
            ended_at,
            skipped: self.remaining_seconds > 0,
        })
    }

    /// `"24:59 | Focus"`
    pub fn title(&self) -> String {
        format!(
            "{} | {}",
            format_clock(self.remaining_seconds),
            self.phase.label()
        )
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TimerSnapshot {
        TimerSnapshot {
            remaining_seconds: self.remaining_seconds,
            phase: self.phase,
            running: self.running,
            interval_start: self.interval_start,
            interval_end: self.interval_end,
            saved_at: now,
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> Event {
        Event::StateSnapshot {
            state: self.state(),
            phase: self.phase,
            remaining_secs: self.remaining_seconds,
            total_secs: self.total_seconds(),
            focus_streak: self.cadence.focus_streak,
            long_break_interval: self.cadence.long_break_interval,
            title: self.title(),
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.running || self.interval_end.is_some() {
            return None;
        }
        if self.remaining_seconds == 0 {
            self.remaining_seconds = self.total_seconds();
        }
        self.running = true;
        if self.interval_start.is_none() {
            self.interval_start = Some(now);
        }
        tracing::debug!(phase = %self.phase, remaining = self.remaining_seconds, "timer started");
        Some(Event::TimerStarted {
            phase: self.phase,
            remaining_secs: self.remaining_seconds,
            at: now,
        })
    }

    /// One second elapsed. Returns the completion when the countdown hits zero.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Completion> {
        if !self.running {
            return None;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds > 0 {
            return None;
        }
        self.running = false;
        self.interval_end = Some(now);
        tracing::debug!(phase = %self.phase, "interval expired");
        Some(Completion {
            phase: self.phase,
            started_at: self.interval_start,
            ended_at: now,
            skipped: false,
        })
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if !self.running {
            return None;
        }
        self.running = false;
        tracing::debug!(phase = %self.phase, remaining = self.remaining_seconds, "timer paused");
        Some(Event::TimerPaused {
            phase: self.phase,
            remaining_secs: self.remaining_seconds,
            at: now,
        })
    }

    pub fn reset(&mut self, now: DateTime<Utc>) -> Event {
        self.running = false;
        self.remaining_seconds = self.total_seconds();
        self.interval_start = None;
        self.interval_end = None;
        Event::TimerReset {
            phase: self.phase,
            remaining_secs: self.remaining_seconds,
            at: now,
        }
    }

    /// Force completion of the current phase regardless of time left.
    pub fn skip(&mut self, now: DateTime<Utc>) -> Completion {
        if let Some(pending) = self.pending_completion() {
            return pending;
        }
        self.running = false;
        self.interval_end = Some(now);
        tracing::debug!(phase = %self.phase, remaining = self.remaining_seconds, "interval skipped");
        Completion {
            phase: self.phase,
            started_at: self.interval_start,
            ended_at: now,
            skipped: true,
        }
    }

    /// Manual phase change. Nothing is logged for the abandoned phase.
    pub fn switch(&mut self, target: Phase, now: DateTime<Utc>) -> Event {
        let from = self.phase;
        self.running = false;
        self.phase = target;
        self.remaining_seconds = self.durations.get(target);
        self.interval_start = None;
        self.interval_end = None;
        Event::PhaseSwitched {
            from,
            to: target,
            remaining_secs: self.remaining_seconds,
            at: now,
        }
    }

    /// Commit a completion: pick the next phase, load its duration and
    /// clear the interval markers. Returns the new phase.
    pub fn advance(&mut self, completion: &Completion) -> Phase {
        let next = self.cadence.next_after(completion.phase);
        self.phase = next;
        self.remaining_seconds = self.durations.get(next);
        self.running = false;
        self.interval_start = None;
        self.interval_end = None;
        tracing::debug!(
            from = %completion.phase,
            to = %next,
            streak = self.cadence.focus_streak,
            "phase advanced"
        );
        next
    }

    /// Replace the phase lengths. An idle machine whose current phase
    /// changed length restarts the countdown from the new value, and a
    /// paused interval is dropped with it.
    pub fn set_durations(&mut self, durations: Durations) -> bool {
        let changed = durations.get(self.phase) != self.durations.get(self.phase);
        self.durations = durations;
        if changed && !self.running && self.interval_end.is_none() {
            self.remaining_seconds = durations.get(self.phase);
            self.interval_start = None;
            return true;
        }
        false
    }

    pub fn set_long_break_interval(&mut self, interval: u32) {
        self.cadence.long_break_interval = interval.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-02T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn short_durations() -> Durations {
        Durations {
            focus: 3,
            short_break: 2,
            long_break: 5,
        }
    }

    fn run_out(machine: &mut TimerMachine, mut now: DateTime<Utc>) -> Completion {
        machine.start(now);
        loop {
            now += Duration::seconds(1);
            if let Some(c) = machine.tick(now) {
                return c;
            }
        }
    }

    #[test]
    fn start_stamps_interval_once() {
        let mut m = TimerMachine::new(short_durations(), Cadence::default());
        assert!(m.start(t0()).is_some());
        assert!(m.start(t0() + Duration::seconds(5)).is_none());
        m.pause(t0() + Duration::seconds(1));
        m.start(t0() + Duration::seconds(9));
        assert_eq!(m.interval_start(), Some(t0()));
    }

    #[test]
    fn tick_while_idle_is_noop() {
        let mut m = TimerMachine::new(short_durations(), Cadence::default());
        assert!(m.tick(t0()).is_none());
        assert_eq!(m.remaining_seconds(), 3);
    }

    #[test]
    fn expiry_stamps_end_and_stops() {
        let mut m = TimerMachine::new(short_durations(), Cadence::default());
        let c = run_out(&mut m, t0());
        assert_eq!(c.phase, Phase::Focus);
        assert_eq!(c.started_at, Some(t0()));
        assert_eq!(c.ended_at, t0() + Duration::seconds(3));
        assert!(!c.skipped);
        assert!(!m.is_running());
        assert_eq!(m.remaining_seconds(), 0);
        assert_eq!(m.pending_completion(), Some(c));
        // Further ticks cannot complete again.
        assert!(m.tick(t0() + Duration::seconds(4)).is_none());
    }

    #[test]
    fn start_is_blocked_until_completion_committed() {
        let mut m = TimerMachine::new(short_durations(), Cadence::default());
        let c = run_out(&mut m, t0());
        assert!(m.start(t0()).is_none());
        assert_eq!(m.advance(&c), Phase::ShortBreak);
        assert_eq!(m.remaining_seconds(), 2);
        assert!(m.interval_start().is_none());
        assert!(m.start(t0()).is_some());
    }

    #[test]
    fn pause_preserves_progress() {
        let mut m = TimerMachine::new(short_durations(), Cadence::default());
        m.start(t0());
        m.tick(t0() + Duration::seconds(1));
        assert!(m.pause(t0() + Duration::seconds(1)).is_some());
        assert!(m.pause(t0()).is_none());
        assert_eq!(m.remaining_seconds(), 2);
        assert_eq!(m.state(), TimerState::Idle);
        assert_eq!(m.interval_start(), Some(t0()));
    }

    #[test]
    fn reset_restores_current_phase_duration() {
        let mut m = TimerMachine::new(short_durations(), Cadence::default());
        m.switch(Phase::LongBreak, t0());
        m.start(t0());
        m.tick(t0() + Duration::seconds(1));
        m.tick(t0() + Duration::seconds(2));
        m.reset(t0() + Duration::seconds(2));
        assert_eq!(m.phase(), Phase::LongBreak);
        assert_eq!(m.remaining_seconds(), 5);
        assert!(m.interval_start().is_none());
        assert!(!m.is_running());
    }

    #[test]
    fn skip_completes_with_time_left() {
        let mut m = TimerMachine::new(short_durations(), Cadence::default());
        m.start(t0());
        let c = m.skip(t0() + Duration::seconds(1));
        assert!(c.skipped);
        assert_eq!(c.ended_at, t0() + Duration::seconds(1));
        assert_eq!(m.remaining_seconds(), 3);
        // A second skip returns the same pending completion.
        assert_eq!(m.skip(t0() + Duration::seconds(2)), c);
    }

    #[test]
    fn switch_loads_target_duration_and_clears_markers() {
        let mut m = TimerMachine::new(short_durations(), Cadence::default());
        m.start(t0());
        let event = m.switch(Phase::ShortBreak, t0());
        assert!(matches!(event, Event::PhaseSwitched { from: Phase::Focus, to: Phase::ShortBreak, .. }));
        assert!(!m.is_running());
        assert_eq!(m.remaining_seconds(), 2);
        assert!(m.interval_start().is_none());
        assert!(m.pending_completion().is_none());
    }

    #[test]
    fn fourth_focus_leads_to_long_break() {
        let mut m = TimerMachine::new(short_durations(), Cadence::new(4));
        let mut now = t0();
        let mut seen = Vec::new();
        for _ in 0..4 {
            let c = run_out(&mut m, now);
            now = c.ended_at;
            seen.push(m.advance(&c));
            if m.phase() != Phase::Focus {
                let c = m.skip(now);
                m.advance(&c);
            }
        }
        assert_eq!(
            seen,
            vec![Phase::ShortBreak, Phase::ShortBreak, Phase::ShortBreak, Phase::LongBreak]
        );
    }

    #[test]
    fn duration_change_resets_idle_countdown() {
        let mut m = TimerMachine::new(short_durations(), Cadence::default());
        let reset = m.set_durations(Durations {
            focus: 10,
            ..short_durations()
        });
        assert!(reset);
        assert_eq!(m.remaining_seconds(), 10);
    }

    #[test]
    fn duration_change_while_paused_starts_a_fresh_interval() {
        let mut m = TimerMachine::new(short_durations(), Cadence::default());
        m.start(t0());
        m.tick(t0() + Duration::seconds(1));
        m.pause(t0() + Duration::seconds(1));
        assert!(m.set_durations(Durations {
            focus: 10,
            ..short_durations()
        }));
        assert!(m.interval_start().is_none());

        let later = t0() + Duration::minutes(30);
        m.start(later);
        assert_eq!(m.interval_start(), Some(later));
        let done = run_out(&mut m, later);
        assert_eq!(done.started_at, Some(later));
        assert_eq!(done.ended_at, later + Duration::seconds(10));
    }

    #[test]
    fn duration_change_leaves_running_countdown() {
        let mut m = TimerMachine::new(short_durations(), Cadence::default());
        m.start(t0());
        m.tick(t0() + Duration::seconds(1));
        assert!(!m.set_durations(Durations {
            focus: 10,
            ..short_durations()
        }));
        assert_eq!(m.remaining_seconds(), 2);
        assert_eq!(m.total_seconds(), 10);
    }

    #[test]
    fn title_matches_clock() {
        let m = TimerMachine::new(Durations::default(), Cadence::default());
        assert_eq!(m.title(), "25:00 | Focus");
    }

    proptest! {
        #[test]
        fn tick_decrements_by_exactly_one(remaining in 2u32..100_000) {
            let durations = Durations { focus: remaining, ..Durations::default() };
            let mut m = TimerMachine::new(durations, Cadence::default());
            m.start(t0());
            prop_assert!(m.tick(t0()).is_none());
            prop_assert_eq!(m.remaining_seconds(), remaining - 1);
        }

        #[test]
        fn countdown_completes_exactly_once(remaining in 1u32..500) {
            let durations = Durations { focus: remaining, ..Durations::default() };
            let mut m = TimerMachine::new(durations, Cadence::default());
            m.start(t0());
            let mut completions = 0;
            for i in 0..(remaining + 10) {
                if m.tick(t0() + Duration::seconds(i as i64)).is_some() {
                    completions += 1;
                }
            }
            prop_assert_eq!(completions, 1);
            prop_assert_eq!(m.remaining_seconds(), 0);
        }
    }
}
