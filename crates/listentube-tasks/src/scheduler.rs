//! Periodic status synchronization for non-terminal tasks
//!
//! The scheduler is idle while the registry is empty and runs a fixed-period
//! timer while it holds at least one task. Each tick walks a snapshot of the
//! registry and queries the job processor for every queued or downloading
//! task, one at a time, merging results back into the [`TaskStore`].
//!
//! Timers come from `tokio::time`, so tests drive the scheduler on a paused
//! clock instead of real delays.

use crate::api::TaskApi;
use crate::store::TaskStore;
use crate::types::{Task, TaskStatus};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Configuration for the polling scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No timer running
    Idle,
    /// Timer running at the poll interval
    Active,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    Started,
    Stopped,
    /// A task reached a terminal status; raised once per task
    Terminated(Task),
    /// A status query failed; previous state was kept
    PollFailed { task_id: String, message: String },
}

impl SchedulerEvent {
    /// User-facing message for a termination; expired and deleted are silent
    pub fn message(&self) -> Option<&'static str> {
        match self {
            SchedulerEvent::Terminated(task) => match task.status {
                TaskStatus::Finished => Some("Task complete!"),
                TaskStatus::Error => Some("Task failed!"),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Counters kept for diagnostics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub polls: u64,
    pub poll_errors: u64,
    pub last_error: Option<String>,
}

pub struct PollingScheduler {
    store: Arc<TaskStore>,
    api: Arc<dyn TaskApi>,
    config: SchedulerConfig,
    events: broadcast::Sender<SchedulerEvent>,
    state_tx: watch::Sender<SchedulerState>,
    ticks: AtomicU64,
    polls: AtomicU64,
    poll_errors: AtomicU64,
    last_error: RwLock<Option<String>>,
}

impl PollingScheduler {
    pub fn new(store: Arc<TaskStore>, api: Arc<dyn TaskApi>, config: SchedulerConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, _) = watch::channel(SchedulerState::Idle);
        Self {
            store,
            api,
            config,
            events,
            state_tx,
            ticks: AtomicU64::new(0),
            polls: AtomicU64::new(0),
            poll_errors: AtomicU64::new(0),
            last_error: RwLock::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state_tx.borrow()
    }

    pub async fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            last_error: self.last_error.read().await.clone(),
        }
    }

    /// Start the supervisor that follows the registry size.
    ///
    /// Dropping the returned handle stops the loop; a query already in flight
    /// is allowed to finish.
    pub fn spawn(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle {
            shutdown_tx,
            task: Some(task),
        }
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut len_rx = self.store.watch_len();

        loop {
            tokio::select! {
                alive = len_reaches(&mut len_rx, |len| *len > 0) => {
                    if !alive {
                        break;
                    }
                }
                _ = stopped(&mut shutdown) => break,
            }

            self.set_state(SchedulerState::Active);

            let period = self.config.poll_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let shutting_down = loop {
                tokio::select! {
                    _ = ticker.tick() => self.tick().await,
                    alive = len_reaches(&mut len_rx, |len| *len == 0) => break !alive,
                    _ = stopped(&mut shutdown) => break true,
                }
            };

            self.set_state(SchedulerState::Idle);
            if shutting_down {
                break;
            }
        }

        debug!("Polling scheduler exited");
    }

    fn set_state(&self, state: SchedulerState) {
        let previous = self.state_tx.send_replace(state);
        if previous == state {
            return;
        }

        match state {
            SchedulerState::Active => {
                info!(interval_ms = self.config.poll_interval.as_millis() as u64, "Polling started");
                let _ = self.events.send(SchedulerEvent::Started);
            }
            SchedulerState::Idle => {
                info!("Polling stopped");
                let _ = self.events.send(SchedulerEvent::Stopped);
            }
        }
    }

    /// Run one synchronization pass over the current snapshot.
    ///
    /// Queries are issued sequentially so no two overlap and the store never
    /// sees interleaved merges. Failures are absorbed; the task is simply
    /// queried again on the next tick.
    pub async fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);

        let pending: Vec<String> = self
            .store
            .all()
            .await
            .into_iter()
            .filter(|task| !task.status.is_terminal())
            .map(|task| task.id)
            .collect();

        for task_id in pending {
            // Skip tasks removed or finished earlier in this pass
            match self.store.get(&task_id).await {
                Some(task) if !task.status.is_terminal() => {}
                _ => continue,
            }
            self.poll_task(&task_id).await;
        }
    }

    async fn poll_task(&self, task_id: &str) {
        self.polls.fetch_add(1, Ordering::Relaxed);

        let patch = match self.api.get_task(task_id).await {
            Ok(patch) => patch,
            Err(e) => {
                warn!(task_id, error = %e, "Failed to poll task status");
                self.poll_errors.fetch_add(1, Ordering::Relaxed);
                *self.last_error.write().await = Some(e.to_string());
                let _ = self.events.send(SchedulerEvent::PollFailed {
                    task_id: task_id.to_string(),
                    message: e.to_string(),
                });
                return;
            }
        };

        let previous = self.store.get(task_id).await.map(|task| task.status);

        let Some(task) = self.store.update(task_id, patch).await else {
            debug!(task_id, "Task removed while polling, discarding result");
            return;
        };

        debug!(
            task_id,
            status = %task.status,
            progress = task.progress,
            "Task status synchronized"
        );

        let was_terminal = previous.is_some_and(TaskStatus::is_terminal);
        if task.status.is_terminal() && !was_terminal {
            info!(task_id, status = %task.status, "Task reached terminal status");
            let _ = self.events.send(SchedulerEvent::Terminated(task));
        }
    }
}

/// Wait until the registry size satisfies `pred`; `false` once the store is
/// gone. The watch guard is released before returning so the caller can hold
/// this future across other awaits.
async fn len_reaches(rx: &mut watch::Receiver<usize>, pred: impl FnMut(&usize) -> bool) -> bool {
    rx.wait_for(pred).await.is_ok()
}

async fn stopped(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Cancellation handle for a spawned scheduler
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop the timer and wait for the loop to exit
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
