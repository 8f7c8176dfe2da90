//! # Focusboard Core Library
//!
//! Core logic for the Focusboard Pomodoro timer: the session state machine,
//! its persistence across process restarts, and the reconciliation of
//! completed intervals with a hosted, PostgREST-style data store.
//!
//! ## Architecture
//!
//! - **Timer**: a pure state machine that takes the current instant on every
//!   command, plus a 1 Hz clock driver that feeds it ticks
//! - **Session**: the owning controller that runs the completion protocol
//!   and persists after every change
//! - **Storage**: SQLite key-value store for restartable state and TOML
//!   configuration
//! - **Remote**: the store trait, its REST and in-memory implementations,
//!   and the bounded outbox that delivers writes at least once
//!
//! ## Key Components
//!
//! - [`PomodoroSession`]: session controller
//! - [`TimerMachine`]: timer state machine
//! - [`ClockDriver`]: tick source
//! - [`Outbox`]: outbound queue for remote writes
//! - [`Database`]: local durable store
//! - [`Config`]: application configuration

pub mod error;
pub mod events;
pub mod remote;
pub mod session;
pub mod settings;
pub mod stats;
pub mod storage;
pub mod tasks;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, RemoteError, ValidationError};
pub use events::Event;
pub use remote::{
    DeliveryFailure, DeliveryReport, IntervalRecord, LeaderboardEntry, MemoryStore, Outbox,
    RemoteOp, RemoteStore, RestStore,
};
pub use session::{Identity, PomodoroSession, SessionOptions};
pub use settings::UserSettings;
pub use storage::{Config, Database, KvStore, MemoryKv};
pub use tasks::{Task, TaskSelector};
pub use timer::{Clock, ClockDriver, ManualClock, Phase, SystemClock, TimerMachine, TimerState};
