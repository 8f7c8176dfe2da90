//! Time sources.
//!
//! [`Clock`] answers "what time is it" for the state machine and the
//! persistence bridge. [`ClockDriver`] is the 1 Hz tick source: a single
//! tokio task that is cancelled and re-armed whenever the timer toggles
//! between running and idle, so two tick streams never overlap.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
    }
}

/// One pulse of the clock driver. `generation` identifies the arming that
/// produced it so stale ticks from a cancelled run can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub generation: u64,
    pub seq: u64,
}

pub struct ClockDriver {
    period: Duration,
    tx: mpsc::Sender<Tick>,
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl ClockDriver {
    pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

    pub fn new(period: Duration) -> (Self, mpsc::Receiver<Tick>) {
        let (tx, rx) = mpsc::channel(8);
        (
            Self {
                period,
                tx,
                handle: None,
                generation: 0,
            },
            rx,
        )
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a fresh tick stream, cancelling any existing one first.
    /// The first tick arrives one full period after arming.
    pub fn arm(&mut self) {
        self.disarm();
        self.generation += 1;
        let generation = self.generation;
        let period = self.period;
        let tx = self.tx.clone();
        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut seq = 0;
            loop {
                interval.tick().await;
                seq += 1;
                if tx.send(Tick { generation, seq }).await.is_err() {
                    break;
                }
            }
        }));
        tracing::trace!(generation, "clock driver armed");
    }

    pub fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::trace!(generation = self.generation, "clock driver disarmed");
        }
    }

    /// Arm or disarm to match the timer's running flag.
    pub fn sync(&mut self, running: bool) {
        match (running, self.is_armed()) {
            (true, false) => self.arm(),
            (false, true) => self.disarm(),
            _ => {}
        }
    }
}

impl Drop for ClockDriver {
    fn drop(&mut self) {
        self.disarm();
    }
}
