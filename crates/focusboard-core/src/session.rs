//! Session controller.
//!
//! [`PomodoroSession`] is the single owner of the timer. It wires the state
//! machine, the task selector, the persistence bridge and the outbox
//! together, with the clock and the remote store injected. Every action
//! persists before it returns, so a process may exit at any point after.
//!
//! Remote writes never happen inline: they are enqueued and delivered by
//! [`PomodoroSession::flush`]. Only bootstrap and task insertion talk to the
//! store directly, both at points where the caller is already waiting on it.
//! Bootstrap drains the outbox and then fetches the user's settings and
//! tasks; task insertion needs the row id back.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;

use crate::error::Result;
use crate::events::Event;
use crate::remote::{DeliveryFailure, DeliveryReport, IntervalRecord, Outbox, RemoteOp, RemoteStore};
use crate::settings::UserSettings;
use crate::storage::{KvStore, PersistenceBridge};
use crate::tasks::{Task, TaskRow, TaskSelector};
use crate::timer::{Clock, Completion, Phase, TimerMachine};

/// The signed-in user and the store their data lives in.
#[derive(Clone)]
pub struct Identity {
    pub user_id: String,
    pub store: Arc<dyn RemoteStore>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, store: Arc<dyn RemoteStore>) -> Self {
        Self {
            user_id: user_id.into(),
            store,
        }
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity").field("user_id", &self.user_id).finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Locally cached settings, used when the remote row is unavailable.
    pub settings: UserSettings,
    pub persist_focus_streak: bool,
    pub outbox_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            settings: UserSettings::default(),
            persist_focus_streak: true,
            outbox_capacity: crate::remote::outbox::DEFAULT_CAPACITY,
        }
    }
}

/// Remote writes still sitting in the outbox after the startup drain.
/// Rows read back from the store are stale for anything listed here.
#[derive(Default)]
struct QueuedWrites {
    settings: bool,
    task_counts: HashMap<String, u32>,
    deleted_tasks: HashSet<String>,
}

impl QueuedWrites {
    fn from_outbox(outbox: &Outbox) -> Self {
        let mut queued = Self::default();
        for entry in outbox.entries() {
            match &entry.op {
                RemoteOp::UpsertSettings { .. } => queued.settings = true,
                RemoteOp::UpdateTaskCount {
                    task_id,
                    completed_pomodoros,
                } => {
                    queued.task_counts.insert(task_id.clone(), *completed_pomodoros);
                }
                RemoteOp::DeleteTask { task_id } => {
                    queued.deleted_tasks.insert(task_id.clone());
                }
                RemoteOp::AppendInterval(_) => {}
            }
        }
        queued
    }

    fn overlay(&self, rows: Vec<TaskRow>) -> Vec<TaskRow> {
        rows.into_iter()
            .filter(|row| !self.deleted_tasks.contains(&row.id))
            .map(|mut row| {
                if let Some(&count) = self.task_counts.get(&row.id) {
                    row.completed_pomodoros = count;
                }
                row
            })
            .collect()
    }
}

pub struct PomodoroSession {
    machine: TimerMachine,
    tasks: TaskSelector,
    settings: UserSettings,
    outbox: Outbox,
    persistence: PersistenceBridge,
    clock: Arc<dyn Clock>,
    identity: Option<Identity>,
    persist_focus_streak: bool,
    /// `saved_at` to keep writing for a restored running countdown until it
    /// next changes, so sub-second remainders are not lost across restarts.
    restored_saved_at: Option<DateTime<Utc>>,
}

impl PomodoroSession {
    /// Restore the session from the local store and reconcile with the
    /// remote store when an identity is known.
    ///
    /// Returns the events produced while coming up: at most one replayed
    /// completion, for a snapshot written between stamping a completion and
    /// committing it.
    ///
    /// # Errors
    /// Returns an error if the local store cannot be read or written.
    pub async fn bootstrap(
        options: SessionOptions,
        kv: Box<dyn KvStore + Send>,
        clock: Arc<dyn Clock>,
        identity: Option<Identity>,
    ) -> Result<(Self, Vec<Event>)> {
        let persistence = PersistenceBridge::new(kv);

        let mut settings = options.settings.normalized();
        let mut tasks = TaskSelector::new(persistence.load_tasks()?);
        let mut outbox = Outbox::with_entries(options.outbox_capacity, persistence.load_outbox()?);
        if let Some(identity) = &identity {
            // Queued writes go out before anything is read back, otherwise
            // the remote rows are older than the local state.
            if !outbox.is_empty() {
                let report = outbox.deliver(identity.store.as_ref()).await;
                tracing::debug!(delivered = report.delivered, pending = report.pending, "drained outbox before sync");
                persistence.save_outbox(&outbox.to_vec())?;
            }
            let queued = QueuedWrites::from_outbox(&outbox);

            if queued.settings {
                tracing::debug!(user = %identity.user_id, "settings write still queued, keeping cached");
            } else {
                match identity.store.fetch_settings(&identity.user_id).await {
                    Ok(Some(remote)) => {
                        let remote = remote.normalized();
                        match remote.validate() {
                            Ok(()) => settings = remote,
                            Err(e) => tracing::warn!(error = %e, "ignoring invalid remote settings"),
                        }
                    }
                    Ok(None) => tracing::debug!(user = %identity.user_id, "no remote settings row, using cached"),
                    Err(e) => tracing::warn!(error = %e, "could not fetch remote settings, using cached"),
                }
            }
            match identity.store.list_tasks(&identity.user_id).await {
                Ok(rows) => tasks.merge_remote(queued.overlay(rows)),
                Err(e) => tracing::warn!(error = %e, "could not fetch remote tasks, using cached"),
            }
        }

        let mut cadence = settings.cadence();
        if options.persist_focus_streak {
            cadence.focus_streak = persistence.load_focus_streak()?.unwrap_or(0);
        }

        let now = clock.now();
        let mut pending = None;
        let mut restored_saved_at = None;
        let machine = match persistence.load_snapshot()? {
            Some(snapshot) => {
                let restored = snapshot.restore(settings.durations(), cadence, now);
                if restored.machine.is_running() {
                    let consumed = snapshot
                        .remaining_seconds
                        .saturating_sub(restored.machine.remaining_seconds());
                    restored_saved_at = Some(snapshot.saved_at + Duration::seconds(i64::from(consumed)));
                }
                pending = restored.pending;
                restored.machine
            }
            None => TimerMachine::new(settings.durations(), cadence),
        };

        let mut session = Self {
            machine,
            tasks,
            settings,
            outbox,
            persistence,
            clock,
            identity,
            persist_focus_streak: options.persist_focus_streak,
            restored_saved_at,
        };

        let mut events = Vec::new();
        if let Some(completion) = pending {
            tracing::info!(phase = %completion.phase, "replaying interrupted completion");
            events.push(session.complete(completion)?);
        } else {
            session.persist()?;
        }
        Ok((session, events))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn machine(&self) -> &TimerMachine {
        &self.machine
    }

    pub fn is_running(&self) -> bool {
        self.machine.is_running()
    }

    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    pub fn tasks(&self) -> &[Task] {
        self.tasks.tasks()
    }

    pub fn active_task(&self) -> Option<&Task> {
        self.tasks.active()
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn title(&self) -> String {
        self.machine.title()
    }

    pub fn status(&self) -> Event {
        self.machine.status(self.clock.now())
    }

    /// Failures of queued remote writes, as they happen.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<DeliveryFailure> {
        self.outbox.subscribe()
    }

    // ── Timer actions ────────────────────────────────────────────────

    pub fn start(&mut self) -> Result<Option<Event>> {
        let event = self.machine.start(self.clock.now());
        if event.is_some() {
            self.touch();
            self.save_snapshot()?;
        }
        Ok(event)
    }

    pub fn pause(&mut self) -> Result<Option<Event>> {
        let event = self.machine.pause(self.clock.now());
        if event.is_some() {
            self.touch();
            self.save_snapshot()?;
        }
        Ok(event)
    }

    pub fn reset(&mut self) -> Result<Event> {
        let event = self.machine.reset(self.clock.now());
        self.touch();
        self.save_snapshot()?;
        Ok(event)
    }

    pub fn switch(&mut self, phase: Phase) -> Result<Event> {
        let event = self.machine.switch(phase, self.clock.now());
        self.touch();
        self.save_snapshot()?;
        Ok(event)
    }

    pub fn skip(&mut self) -> Result<Event> {
        let completion = self.machine.skip(self.clock.now());
        self.complete(completion)
    }

    /// One second elapsed. Returns the completion event when the countdown
    /// ran out on this tick.
    pub fn tick(&mut self) -> Result<Option<Event>> {
        if !self.machine.is_running() {
            return Ok(None);
        }
        self.touch();
        match self.machine.tick(self.clock.now()) {
            Some(completion) => self.complete(completion).map(Some),
            None => {
                self.save_snapshot()?;
                Ok(None)
            }
        }
    }

    /// Log, credit, advance, persist. Runs for natural expiry, skip and
    /// replay alike; remote trouble never holds up the phase change.
    fn complete(&mut self, completion: Completion) -> Result<Event> {
        let now = self.clock.now();
        let active_id = self.tasks.active().and_then(|t| t.id.clone());

        if let (Some(identity), Some(started_at)) = (&self.identity, completion.started_at) {
            self.outbox.enqueue(RemoteOp::AppendInterval(IntervalRecord::new(
                &identity.user_id,
                active_id,
                completion.phase,
                started_at,
                completion.ended_at,
            )));
        }

        let mut credited = None;
        if completion.phase == Phase::Focus && completion.started_at.is_some() {
            if let Some(task) = self.tasks.record_active_completion() {
                credited = Some(task.name.clone());
                if let (Some(_), Some(task_id)) = (&self.identity, &task.id) {
                    self.outbox.enqueue(RemoteOp::UpdateTaskCount {
                        task_id: task_id.clone(),
                        completed_pomodoros: task.completed_count,
                    });
                }
            }
        }

        let next = self.machine.advance(&completion);
        self.touch();
        self.persistence.clear_snapshot()?;

        let auto_start = match next {
            Phase::Focus => self.settings.auto_start_pomodoro,
            Phase::ShortBreak | Phase::LongBreak => self.settings.auto_start_break,
        };
        let auto_started = auto_start && self.machine.start(now).is_some();

        self.persist()?;

        tracing::info!(
            phase = %completion.phase,
            next = %next,
            skipped = completion.skipped,
            auto_started,
            "interval completed"
        );
        Ok(Event::IntervalCompleted {
            phase: completion.phase,
            started_at: completion.started_at,
            ended_at: completion.ended_at,
            skipped: completion.skipped,
            next_phase: next,
            task: credited,
            auto_started,
        })
    }

    // ── Settings ─────────────────────────────────────────────────────

    /// Validate and apply new settings. Returns an event when the idle
    /// countdown was reset to a new duration.
    ///
    /// # Errors
    /// Returns a validation error for non-positive durations or a zero
    /// long-break interval; nothing changes in that case.
    pub fn apply_settings(&mut self, settings: UserSettings) -> Result<Option<Event>> {
        settings.validate()?;
        let now = self.clock.now();
        let reset = self.machine.set_durations(settings.durations());
        self.machine.set_long_break_interval(settings.long_break_interval);
        self.settings = settings;

        if let Some(identity) = &self.identity {
            self.outbox.enqueue(RemoteOp::UpsertSettings {
                user_id: identity.user_id.clone(),
                settings,
            });
        }
        if reset {
            self.touch();
        }
        self.persist()?;

        Ok(reset.then(|| Event::DurationsChanged {
            phase: self.machine.phase(),
            remaining_secs: self.machine.remaining_seconds(),
            at: now,
        }))
    }

    // ── Tasks ────────────────────────────────────────────────────────

    /// Add a task at the head of the list. With an identity the remote
    /// insert is awaited so the task carries its id; if that fails the task
    /// stays local.
    ///
    /// # Errors
    /// Returns a validation error for a blank name.
    pub async fn add_task(&mut self, name: &str) -> Result<Task> {
        let mut task = Task::new(name)?;
        if let Some(identity) = &self.identity {
            match identity.store.insert_task(&identity.user_id, &task.name, 0).await {
                Ok(row) => task = Task::from(row),
                Err(e) => tracing::warn!(error = %e, "task insert failed, keeping it local"),
            }
        }
        let task = self.tasks.insert_front(task).clone();
        self.persistence.save_tasks(self.tasks.tasks())?;
        Ok(task)
    }

    pub fn set_active_task(&mut self, index: usize) -> Result<Task> {
        let task = self.tasks.set_active(index)?.clone();
        self.persistence.save_tasks(self.tasks.tasks())?;
        Ok(task)
    }

    pub fn remove_task(&mut self, index: usize) -> Result<Task> {
        let task = self.tasks.remove(index)?;
        if let (Some(_), Some(task_id)) = (&self.identity, &task.id) {
            self.outbox.enqueue(RemoteOp::DeleteTask {
                task_id: task_id.clone(),
            });
        }
        self.persistence.save_tasks(self.tasks.tasks())?;
        self.persistence.save_outbox(&self.outbox.to_vec())?;
        Ok(task)
    }

    // ── Outbox ───────────────────────────────────────────────────────

    /// Deliver queued remote writes. Without an identity nothing is sent
    /// and the report only counts what is pending.
    pub async fn flush(&mut self) -> Result<DeliveryReport> {
        let Some(store) = self.identity.as_ref().map(|i| Arc::clone(&i.store)) else {
            return Ok(DeliveryReport {
                pending: self.outbox.len(),
                ..DeliveryReport::default()
            });
        };
        if self.outbox.is_empty() {
            return Ok(DeliveryReport::default());
        }
        let report = self.outbox.deliver(store.as_ref()).await;
        self.persistence.save_outbox(&self.outbox.to_vec())?;
        Ok(report)
    }

    // ── Persistence ──────────────────────────────────────────────────

    fn touch(&mut self) {
        self.restored_saved_at = None;
    }

    fn save_snapshot(&self) -> Result<()> {
        let mut snapshot = self.machine.snapshot(self.clock.now());
        if let Some(saved_at) = self.restored_saved_at {
            snapshot.saved_at = saved_at;
        }
        self.persistence.save_snapshot(&snapshot)
    }

    /// Write everything restartable.
    pub fn persist(&self) -> Result<()> {
        self.save_snapshot()?;
        self.persistence.save_tasks(self.tasks.tasks())?;
        if self.persist_focus_streak {
            self.persistence
                .save_focus_streak(self.machine.cadence().focus_streak)?;
        }
        self.persistence.save_outbox(&self.outbox.to_vec())?;
        Ok(())
    }
}
