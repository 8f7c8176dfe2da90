//! Bounded outbound queue for remote writes.
//!
//! Writes are enqueued locally and delivered in order by [`Outbox::deliver`].
//! An entry leaves the queue only once the store acknowledged it, so delivery
//! is at-least-once; the operations themselves are idempotent (interval ids,
//! absolute task counters, settings upserts). When full, the oldest entry is
//! evicted. Failures of either kind are broadcast to subscribers.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{IntervalRecord, RemoteStore};
use crate::error::RemoteError;
use crate::settings::UserSettings;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RemoteOp {
    AppendInterval(IntervalRecord),
    UpdateTaskCount { task_id: String, completed_pomodoros: u32 },
    DeleteTask { task_id: String },
    UpsertSettings { user_id: String, settings: UserSettings },
}

impl RemoteOp {
    pub fn name(&self) -> &'static str {
        match self {
            RemoteOp::AppendInterval(_) => "append_interval",
            RemoteOp::UpdateTaskCount { .. } => "update_task_count",
            RemoteOp::DeleteTask { .. } => "delete_task",
            RemoteOp::UpsertSettings { .. } => "upsert_settings",
        }
    }

    async fn apply(&self, store: &dyn RemoteStore) -> Result<(), RemoteError> {
        match self {
            RemoteOp::AppendInterval(record) => store.append_interval(record).await,
            RemoteOp::UpdateTaskCount {
                task_id,
                completed_pomodoros,
            } => store.update_task_count(task_id, *completed_pomodoros).await,
            RemoteOp::DeleteTask { task_id } => store.delete_task(task_id).await,
            RemoteOp::UpsertSettings { user_id, settings } => {
                store.upsert_settings(user_id, settings).await
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub op: RemoteOp,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The store rejected or could not be reached; the entry stays queued.
    Attempt,
    /// The queue was full and the entry was evicted undelivered.
    Evicted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    pub entry_id: Uuid,
    pub op: &'static str,
    pub kind: FailureKind,
    pub attempts: u32,
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
    pub pending: usize,
}

pub struct Outbox {
    entries: VecDeque<OutboxEntry>,
    capacity: usize,
    failures: broadcast::Sender<DeliveryFailure>,
}

impl Outbox {
    pub fn new(capacity: usize) -> Self {
        let (failures, _) = broadcast::channel(64);
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            failures,
        }
    }

    /// Rebuild from persisted entries, keeping the newest `capacity`.
    pub fn with_entries(capacity: usize, entries: Vec<OutboxEntry>) -> Self {
        let mut outbox = Self::new(capacity);
        let skip = entries.len().saturating_sub(outbox.capacity);
        outbox.entries = entries.into_iter().skip(skip).collect();
        outbox
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryFailure> {
        self.failures.subscribe()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entries(&self) -> impl Iterator<Item = &OutboxEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<OutboxEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn enqueue(&mut self, op: RemoteOp) -> Uuid {
        while self.entries.len() >= self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                tracing::warn!(op = evicted.op.name(), id = %evicted.id, "outbox full, evicting oldest entry");
                self.report(DeliveryFailure {
                    entry_id: evicted.id,
                    op: evicted.op.name(),
                    kind: FailureKind::Evicted,
                    attempts: evicted.attempts,
                    error: "outbox capacity exceeded".into(),
                });
            }
        }
        let id = Uuid::new_v4();
        tracing::debug!(op = op.name(), %id, "enqueued remote write");
        self.entries.push_back(OutboxEntry {
            id,
            op,
            enqueued_at: Utc::now(),
            attempts: 0,
            last_error: None,
        });
        id
    }

    /// Deliver queued writes in order. Stops at the first failure so later
    /// writes never overtake an earlier one.
    pub async fn deliver(&mut self, store: &dyn RemoteStore) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        while let Some(entry) = self.entries.front_mut() {
            entry.attempts += 1;
            match entry.op.apply(store).await {
                Ok(()) => {
                    tracing::debug!(op = entry.op.name(), id = %entry.id, attempts = entry.attempts, "remote write delivered");
                    self.entries.pop_front();
                    report.delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(op = entry.op.name(), id = %entry.id, attempts = entry.attempts, error = %e, "remote write failed");
                    entry.last_error = Some(e.to_string());
                    let failure = DeliveryFailure {
                        entry_id: entry.id,
                        op: entry.op.name(),
                        kind: FailureKind::Attempt,
                        attempts: entry.attempts,
                        error: e.to_string(),
                    };
                    self.report(failure);
                    report.failed += 1;
                    break;
                }
            }
        }
        report.pending = self.entries.len();
        report
    }

    fn report(&self, failure: DeliveryFailure) {
        // No subscribers is fine.
        let _ = self.failures.send(failure);
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;
    use crate::timer::Phase;
    use chrono::Duration;

    fn interval(user: &str) -> RemoteOp {
        let start = Utc::now();
        RemoteOp::AppendInterval(IntervalRecord::new(
            user,
            None,
            Phase::Focus,
            start,
            start + Duration::minutes(25),
        ))
    }

    #[tokio::test]
    async fn delivers_in_order_and_drains() {
        let store = MemoryStore::new();
        let mut outbox = Outbox::new(8);
        outbox.enqueue(interval("u1"));
        outbox.enqueue(interval("u2"));
        let report = outbox.deliver(&store).await;
        assert_eq!(report, DeliveryReport { delivered: 2, failed: 0, pending: 0 });
        let users: Vec<_> = store.intervals().into_iter().map(|r| r.user_id).collect();
        assert_eq!(users, ["u1", "u2"]);
    }

    #[tokio::test]
    async fn failed_entry_stays_until_acknowledged() {
        let store = MemoryStore::new();
        let mut outbox = Outbox::new(8);
        let mut failures = outbox.subscribe();
        let id = outbox.enqueue(interval("u1"));
        outbox.enqueue(interval("u1"));

        store.set_offline(true);
        let report = outbox.deliver(&store).await;
        assert_eq!(report, DeliveryReport { delivered: 0, failed: 1, pending: 2 });
        let failure = failures.try_recv().unwrap();
        assert_eq!(failure.entry_id, id);
        assert_eq!(failure.kind, FailureKind::Attempt);
        assert_eq!(outbox.entries().next().unwrap().attempts, 1);

        store.set_offline(false);
        let report = outbox.deliver(&store).await;
        assert_eq!(report.delivered, 2);
        assert!(outbox.is_empty());
        assert_eq!(store.intervals().len(), 2);
    }

    #[tokio::test]
    async fn redelivery_does_not_duplicate_records() {
        let store = MemoryStore::new();
        let op = interval("u1");
        let mut first = Outbox::new(4);
        first.enqueue(op.clone());
        first.deliver(&store).await;
        // Same op replayed from a stale persisted queue.
        let mut second = Outbox::new(4);
        second.enqueue(op);
        second.deliver(&store).await;
        assert_eq!(store.intervals().len(), 1);
    }

    #[test]
    fn overflow_evicts_oldest_and_reports() {
        let mut outbox = Outbox::new(2);
        let mut failures = outbox.subscribe();
        let first = outbox.enqueue(interval("a"));
        outbox.enqueue(interval("b"));
        outbox.enqueue(interval("c"));
        assert_eq!(outbox.len(), 2);
        let failure = failures.try_recv().unwrap();
        assert_eq!(failure.entry_id, first);
        assert_eq!(failure.kind, FailureKind::Evicted);
    }

    #[test]
    fn persisted_entries_round_trip_through_json() {
        let mut outbox = Outbox::new(4);
        outbox.enqueue(RemoteOp::UpdateTaskCount {
            task_id: "t1".into(),
            completed_pomodoros: 3,
        });
        let json = serde_json::to_string(&outbox.to_vec()).unwrap();
        let entries: Vec<OutboxEntry> = serde_json::from_str(&json).unwrap();
        let restored = Outbox::with_entries(1, entries);
        assert_eq!(restored.len(), 1);
        assert!(matches!(
            restored.entries().next().unwrap().op,
            RemoteOp::UpdateTaskCount { completed_pomodoros: 3, .. }
        ));
    }
}
