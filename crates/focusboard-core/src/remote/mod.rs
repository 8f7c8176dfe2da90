//! Remote store boundary.
//!
//! The hosted database is treated as plain row storage plus three
//! aggregation RPCs. [`RemoteStore`] is the seam; [`RestStore`] speaks the
//! PostgREST dialect, [`MemoryStore`] keeps everything in process.

mod memory;
pub mod outbox;
mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RemoteError;
use crate::settings::UserSettings;
use crate::tasks::TaskRow;
use crate::timer::Phase;

pub use memory::MemoryStore;
pub use outbox::{DeliveryFailure, DeliveryReport, FailureKind, Outbox, OutboxEntry, RemoteOp};
pub use rest::RestStore;

/// One completed interval. Append-only; `id` makes repeated delivery of the
/// same record harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRecord {
    pub id: Uuid,
    pub user_id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(rename = "type")]
    pub phase: Phase,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl IntervalRecord {
    pub fn new(
        user_id: &str,
        task_id: Option<String>,
        phase: Phase,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            task_id,
            phase,
            start_time,
            end_time,
        }
    }

    /// Length rounded to the nearest whole minute.
    pub fn minutes(&self) -> u64 {
        let ms = (self.end_time - self.start_time).num_milliseconds().max(0) as u64;
        (ms + 30_000) / 60_000
    }
}

/// Per-task breakdown from the `get_task_sessions` RPC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSessionStats {
    pub task_id: String,
    #[serde(default)]
    pub total_sessions: u64,
    #[serde(default)]
    pub focus_count: u64,
    #[serde(default)]
    pub short_break_count: u64,
    #[serde(default)]
    pub long_break_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTotal {
    pub user_id: String,
    #[serde(default)]
    pub total_pomodoro_sessions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    #[serde(default, alias = "username", alias = "email")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub total_pomodoro_sessions: u64,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_settings(&self, user_id: &str) -> Result<Option<UserSettings>, RemoteError>;

    async fn upsert_settings(&self, user_id: &str, settings: &UserSettings) -> Result<(), RemoteError>;

    async fn append_interval(&self, record: &IntervalRecord) -> Result<(), RemoteError>;

    /// Newest first.
    async fn list_intervals(&self, user_id: &str) -> Result<Vec<IntervalRecord>, RemoteError>;

    /// Oldest first.
    async fn list_tasks(&self, user_id: &str) -> Result<Vec<TaskRow>, RemoteError>;

    async fn insert_task(
        &self,
        user_id: &str,
        name: &str,
        completed_pomodoros: u32,
    ) -> Result<TaskRow, RemoteError>;

    async fn update_task_count(&self, task_id: &str, completed_pomodoros: u32) -> Result<(), RemoteError>;

    async fn delete_task(&self, task_id: &str) -> Result<(), RemoteError>;

    async fn total_focus_sessions(&self, user_id: &str) -> Result<u64, RemoteError>;

    async fn task_session_counts(&self, user_id: &str) -> Result<Vec<TaskSessionStats>, RemoteError>;

    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, RemoteError>;
}
