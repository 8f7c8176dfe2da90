//! In-process remote store.
//!
//! Backs the test suites and local demos. Aggregations are computed the way
//! the hosted RPCs compute them. It can be taken offline or told to fail the
//! next N calls to exercise delivery failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{IntervalRecord, LeaderboardEntry, RemoteStore, TaskSessionStats};
use crate::error::RemoteError;
use crate::settings::UserSettings;
use crate::tasks::TaskRow;
use crate::timer::Phase;

#[derive(Debug, Default)]
struct Tables {
    settings: HashMap<String, UserSettings>,
    intervals: Vec<IntervalRecord>,
    tasks: Vec<TaskRow>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    offline: AtomicBool,
    fail_next: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next `n` calls with [`RemoteError::Unavailable`].
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn intervals(&self) -> Vec<IntervalRecord> {
        self.lock().intervals.clone()
    }

    pub fn tasks(&self) -> Vec<TaskRow> {
        self.lock().tasks.clone()
    }

    pub fn settings(&self, user_id: &str) -> Option<UserSettings> {
        self.lock().settings.get(user_id).copied()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn gate(&self) -> Result<MutexGuard<'_, Tables>, RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable);
        }
        let failed = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failed.is_ok() {
            return Err(RemoteError::Unavailable);
        }
        Ok(self.lock())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn fetch_settings(&self, user_id: &str) -> Result<Option<UserSettings>, RemoteError> {
        Ok(self.gate()?.settings.get(user_id).copied())
    }

    async fn upsert_settings(&self, user_id: &str, settings: &UserSettings) -> Result<(), RemoteError> {
        self.gate()?.settings.insert(user_id.to_string(), *settings);
        Ok(())
    }

    async fn append_interval(&self, record: &IntervalRecord) -> Result<(), RemoteError> {
        let mut tables = self.gate()?;
        if !tables.intervals.iter().any(|r| r.id == record.id) {
            tables.intervals.push(record.clone());
        }
        Ok(())
    }

    async fn list_intervals(&self, user_id: &str) -> Result<Vec<IntervalRecord>, RemoteError> {
        let mut rows: Vec<IntervalRecord> = self
            .gate()?
            .intervals
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(rows)
    }

    async fn list_tasks(&self, user_id: &str) -> Result<Vec<TaskRow>, RemoteError> {
        Ok(self
            .gate()?
            .tasks
            .iter()
            .filter(|t| t.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn insert_task(
        &self,
        user_id: &str,
        name: &str,
        completed_pomodoros: u32,
    ) -> Result<TaskRow, RemoteError> {
        let row = TaskRow {
            id: Uuid::new_v4().to_string(),
            user_id: Some(user_id.to_string()),
            name: name.to_string(),
            completed_pomodoros,
            created_at: Some(Utc::now()),
        };
        self.gate()?.tasks.push(row.clone());
        Ok(row)
    }

    async fn update_task_count(&self, task_id: &str, completed_pomodoros: u32) -> Result<(), RemoteError> {
        let mut tables = self.gate()?;
        if let Some(task) = tables.tasks.iter_mut().find(|t| t.id == task_id) {
            task.completed_pomodoros = completed_pomodoros;
        }
        Ok(())
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), RemoteError> {
        self.gate()?.tasks.retain(|t| t.id != task_id);
        Ok(())
    }

    async fn total_focus_sessions(&self, user_id: &str) -> Result<u64, RemoteError> {
        Ok(self
            .gate()?
            .intervals
            .iter()
            .filter(|r| r.user_id == user_id && r.phase == Phase::Focus)
            .count() as u64)
    }

    async fn task_session_counts(&self, user_id: &str) -> Result<Vec<TaskSessionStats>, RemoteError> {
        let tables = self.gate()?;
        let mut by_task: Vec<TaskSessionStats> = Vec::new();
        for rec in tables.intervals.iter().filter(|r| r.user_id == user_id) {
            let Some(task_id) = &rec.task_id else { continue };
            let pos = match by_task.iter().position(|s| &s.task_id == task_id) {
                Some(pos) => pos,
                None => {
                    by_task.push(TaskSessionStats {
                        task_id: task_id.clone(),
                        ..TaskSessionStats::default()
                    });
                    by_task.len() - 1
                }
            };
            let stats = &mut by_task[pos];
            stats.total_sessions += 1;
            match rec.phase {
                Phase::Focus => stats.focus_count += 1,
                Phase::ShortBreak => stats.short_break_count += 1,
                Phase::LongBreak => stats.long_break_count += 1,
            }
        }
        Ok(by_task)
    }

    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, RemoteError> {
        let tables = self.gate()?;
        let mut totals: HashMap<&str, u64> = HashMap::new();
        for rec in tables.intervals.iter().filter(|r| r.phase == Phase::Focus) {
            *totals.entry(rec.user_id.as_str()).or_default() += 1;
        }
        let mut entries: Vec<LeaderboardEntry> = totals
            .into_iter()
            .map(|(user_id, total)| LeaderboardEntry {
                user_id: user_id.to_string(),
                display_name: None,
                total_pomodoro_sessions: total,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.total_pomodoro_sessions
                .cmp(&a.total_pomodoro_sessions)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(entries)
    }
}
