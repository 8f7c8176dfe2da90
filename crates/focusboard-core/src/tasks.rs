//! Task selector.
//!
//! An ordered list of work items. The head of the list is the active task;
//! there is no separate "active" field, activating a task moves it to the
//! front. New tasks are inserted at the head and so become active.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Remote row id; `None` until the task has been stored remotely.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub completed_count: u32,
}

impl Task {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Empty("task name".into()));
        }
        Ok(Self {
            id: None,
            name: name.to_string(),
            completed_count: 0,
        })
    }
}

/// A row of the remote `tasks` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub completed_pomodoros: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Self {
            id: Some(row.id),
            name: row.name,
            completed_count: row.completed_pomodoros,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSelector {
    tasks: Vec<Task>,
}

impl TaskSelector {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn active(&self) -> Option<&Task> {
        self.tasks.first()
    }

    /// Put a task at the head of the list, making it active.
    pub fn insert_front(&mut self, task: Task) -> &Task {
        self.tasks.insert(0, task);
        &self.tasks[0]
    }

    /// Move the task at `index` to the head. Index 0 is a no-op.
    pub fn set_active(&mut self, index: usize) -> Result<&Task, ValidationError> {
        self.check_index(index)?;
        if index > 0 {
            let task = self.tasks.remove(index);
            self.tasks.insert(0, task);
        }
        Ok(&self.tasks[0])
    }

    pub fn remove(&mut self, index: usize) -> Result<Task, ValidationError> {
        self.check_index(index)?;
        Ok(self.tasks.remove(index))
    }

    /// Bump the active task, synced or not. Returns the task after the bump.
    pub fn record_active_completion(&mut self) -> Option<&Task> {
        let task = self.tasks.first_mut()?;
        task.completed_count = task.completed_count.saturating_add(1);
        Some(&*task)
    }

    /// Reconcile with the remote task list.
    ///
    /// Local order wins for tasks both sides know; counters come from the
    /// remote row. Remote-only tasks are appended newest first. Synced local
    /// tasks missing remotely were deleted elsewhere and are dropped;
    /// unsynced local tasks are kept.
    pub fn merge_remote(&mut self, mut rows: Vec<TaskRow>) {
        let mut merged = Vec::with_capacity(self.tasks.len().max(rows.len()));
        for task in self.tasks.drain(..) {
            if task.id.is_none() {
                merged.push(task);
                continue;
            }
            if let Some(pos) = rows.iter().position(|r| Some(&r.id) == task.id.as_ref()) {
                merged.push(Task::from(rows.remove(pos)));
            }
        }
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        merged.extend(rows.into_iter().map(Task::from));
        self.tasks = merged;
    }

    fn check_index(&self, index: usize) -> Result<(), ValidationError> {
        if index >= self.tasks.len() {
            return Err(ValidationError::OutOfBounds {
                collection: "tasks".into(),
                index,
                len: self.tasks.len(),
            });
        }
        Ok(())
    }
}
