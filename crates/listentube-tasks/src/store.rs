//! In-memory task registry with change notification

use crate::types::{Task, TaskPatch};
use std::collections::HashMap;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::debug;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Change notification published after every mutation
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Added(Task),
    Updated(Task),
    Removed(String),
}

#[derive(Default)]
struct Registry {
    tasks: HashMap<String, Task>,
    /// Insertion order, for stable enumeration
    order: Vec<String>,
}

/// The single writer for task state.
///
/// Shared by reference (`Arc<TaskStore>`) between the scheduler and any
/// presentation layer; nothing else holds task records.
pub struct TaskStore {
    registry: RwLock<Registry>,
    events: broadcast::Sender<StoreEvent>,
    len_tx: watch::Sender<usize>,
}

impl TaskStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (len_tx, _) = watch::channel(0);
        Self {
            registry: RwLock::new(Registry::default()),
            events,
            len_tx,
        }
    }

    /// Merge `patch` into the record for `id`, creating it if absent
    pub async fn upsert(&self, id: &str, patch: TaskPatch) -> Task {
        let mut registry = self.registry.write().await;

        let (task, created) = match registry.tasks.get_mut(id) {
            Some(task) => {
                task.apply(patch);
                (task.clone(), false)
            }
            None => {
                let mut task = Task::new(id);
                task.apply(patch);
                registry.tasks.insert(id.to_string(), task.clone());
                registry.order.push(id.to_string());
                (task, true)
            }
        };

        self.len_tx.send_replace(registry.tasks.len());
        drop(registry);

        if created {
            debug!(task_id = %id, "Task added");
            let _ = self.events.send(StoreEvent::Added(task.clone()));
        } else {
            let _ = self.events.send(StoreEvent::Updated(task.clone()));
        }
        task
    }

    /// Merge `patch` only if the record still exists
    pub async fn update(&self, id: &str, patch: TaskPatch) -> Option<Task> {
        let task = {
            let mut registry = self.registry.write().await;
            let task = registry.tasks.get_mut(id)?;
            task.apply(patch);
            task.clone()
        };

        let _ = self.events.send(StoreEvent::Updated(task.clone()));
        Some(task)
    }

    pub async fn remove(&self, id: &str) -> Option<Task> {
        let removed = {
            let mut registry = self.registry.write().await;
            let removed = registry.tasks.remove(id);
            if removed.is_some() {
                registry.order.retain(|existing| existing != id);
                self.len_tx.send_replace(registry.tasks.len());
            }
            removed
        };

        if removed.is_some() {
            debug!(task_id = %id, "Task removed");
            let _ = self.events.send(StoreEvent::Removed(id.to_string()));
        }
        removed
    }

    pub async fn get(&self, id: &str) -> Option<Task> {
        self.registry.read().await.tasks.get(id).cloned()
    }

    /// Snapshot of every task in insertion order
    pub async fn all(&self) -> Vec<Task> {
        let registry = self.registry.read().await;
        registry
            .order
            .iter()
            .filter_map(|id| registry.tasks.get(id).cloned())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.registry.read().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Registry size, updated atomically with each mutation
    pub fn watch_len(&self) -> watch::Receiver<usize> {
        self.len_tx.subscribe()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
