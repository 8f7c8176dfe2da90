//! Analytics over the interval log and the remote aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::remote::{IntervalRecord, LeaderboardEntry, RemoteStore, TaskSessionStats};
use crate::tasks::Task;
use crate::timer::Phase;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_sessions: u64,
    pub completed_pomodoros: u64,
    pub total_focus_min: u64,
    pub total_short_break_min: u64,
    pub total_long_break_min: u64,
    pub today_sessions: u64,
    pub today_focus_min: u64,
}

impl Stats {
    /// Fold interval records into totals. Each interval is rounded to whole
    /// minutes before summing; "today" is the UTC day of `now`.
    pub fn from_records(records: &[IntervalRecord], now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let mut stats = Stats::default();
        for rec in records {
            let minutes = rec.minutes();
            stats.total_sessions += 1;
            match rec.phase {
                Phase::Focus => {
                    stats.completed_pomodoros += 1;
                    stats.total_focus_min += minutes;
                    if rec.end_time.date_naive() == today {
                        stats.today_sessions += 1;
                        stats.today_focus_min += minutes;
                    }
                }
                Phase::ShortBreak => stats.total_short_break_min += minutes,
                Phase::LongBreak => stats.total_long_break_min += minutes,
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    pub stats: Stats,
    /// Newest first.
    pub records: Vec<IntervalRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    #[serde(flatten)]
    pub task: Task,
    pub sessions: Option<TaskSessionStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub user_id: String,
    pub total_focus_sessions: u64,
    pub tasks: Vec<TaskSummary>,
}

/// The user's interval log with totals.
///
/// # Errors
/// Returns the store's error when the log cannot be fetched.
pub async fn history(
    store: &dyn RemoteStore,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<History, RemoteError> {
    let mut records = store.list_intervals(user_id).await?;
    records.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    Ok(History {
        stats: Stats::from_records(&records, now),
        records,
    })
}

/// Total focus sessions plus the per-task breakdown laid over `tasks`.
/// Tasks without an id, or without any logged interval, get no breakdown.
///
/// # Errors
/// Returns the store's error when either aggregate cannot be fetched.
pub async fn summary(
    store: &dyn RemoteStore,
    user_id: &str,
    tasks: &[Task],
) -> Result<Summary, RemoteError> {
    let total_focus_sessions = store.total_focus_sessions(user_id).await?;
    let mut per_task = store.task_session_counts(user_id).await?;
    let tasks = tasks
        .iter()
        .map(|task| {
            let sessions = task.id.as_ref().and_then(|id| {
                per_task
                    .iter()
                    .position(|s| &s.task_id == id)
                    .map(|pos| per_task.swap_remove(pos))
            });
            TaskSummary {
                task: task.clone(),
                sessions,
            }
        })
        .collect();
    Ok(Summary {
        user_id: user_id.to_string(),
        total_focus_sessions,
        tasks,
    })
}

/// Global ranking by completed focus sessions, optionally cut to `limit`.
///
/// # Errors
/// Returns the store's error when the ranking cannot be fetched.
pub async fn leaderboard(
    store: &dyn RemoteStore,
    limit: Option<usize>,
) -> Result<Vec<LeaderboardEntry>, RemoteError> {
    let mut entries = store.leaderboard().await?;
    entries.sort_by(|a, b| b.total_pomodoro_sessions.cmp(&a.total_pomodoro_sessions));
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    Ok(entries)
}
