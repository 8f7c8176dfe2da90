//! Typed access to the local durable store.
//!
//! Each piece of restartable state lives under one fixed key as JSON.
//! Values that fail to parse are treated as absent and logged; a corrupt
//! entry must never stop the timer from coming up.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::database::KvStore;
use crate::error::Result;
use crate::remote::OutboxEntry;
use crate::tasks::Task;
use crate::timer::TimerSnapshot;

pub const SNAPSHOT_KEY: &str = "pomodoro_state";
pub const TASKS_KEY: &str = "task_list";
pub const FOCUS_STREAK_KEY: &str = "focus_streak";
pub const OUTBOX_KEY: &str = "outbox";

pub struct PersistenceBridge {
    kv: Box<dyn KvStore + Send>,
}

impl PersistenceBridge {
    pub fn new(kv: Box<dyn KvStore + Send>) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &dyn KvStore {
        self.kv.as_ref()
    }

    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.kv.kv_get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring unparseable stored value");
                Ok(None)
            }
        }
    }

    fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.kv.kv_set(key, &json)
    }

    // ── Timer snapshot ───────────────────────────────────────────────

    pub fn load_snapshot(&self) -> Result<Option<TimerSnapshot>> {
        self.load_json(SNAPSHOT_KEY)
    }

    pub fn save_snapshot(&self, snapshot: &TimerSnapshot) -> Result<()> {
        self.save_json(SNAPSHOT_KEY, snapshot)
    }

    pub fn clear_snapshot(&self) -> Result<()> {
        self.kv.kv_delete(SNAPSHOT_KEY)
    }

    // ── Tasks ────────────────────────────────────────────────────────

    pub fn load_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.load_json(TASKS_KEY)?.unwrap_or_default())
    }

    pub fn save_tasks(&self, tasks: &[Task]) -> Result<()> {
        self.save_json(TASKS_KEY, tasks)
    }

    // ── Long-break cadence ───────────────────────────────────────────

    pub fn load_focus_streak(&self) -> Result<Option<u32>> {
        self.load_json(FOCUS_STREAK_KEY)
    }

    pub fn save_focus_streak(&self, streak: u32) -> Result<()> {
        self.save_json(FOCUS_STREAK_KEY, &streak)
    }

    // ── Outbox ───────────────────────────────────────────────────────

    pub fn load_outbox(&self) -> Result<Vec<OutboxEntry>> {
        Ok(self.load_json(OUTBOX_KEY)?.unwrap_or_default())
    }

    pub fn save_outbox(&self, entries: &[OutboxEntry]) -> Result<()> {
        self.save_json(OUTBOX_KEY, entries)
    }
}
