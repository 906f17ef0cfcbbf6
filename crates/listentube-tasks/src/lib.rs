//! ListenTube task tracking
//!
//! Keeps a local registry of server-side audio extraction jobs consistent
//! with the job processor's reported state. A [`PollingScheduler`] queries
//! every non-terminal task on a fixed period and merges the results into the
//! [`TaskStore`]; [`TaskManager`] covers submission and retrieval.

pub mod api;
pub mod error;
pub mod manager;
pub mod scheduler;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod testing;

pub use api::{AudioFile, HttpTaskApi, TaskApi};
pub use error::{Result, TaskError};
pub use manager::TaskManager;
pub use scheduler::{
    PollingScheduler, SchedulerConfig, SchedulerEvent, SchedulerHandle, SchedulerState,
    SchedulerStats,
};
pub use store::{StoreEvent, TaskStore};
pub use types::{AudioFormat, CreateTaskRequest, Speed, Task, TaskPatch, TaskStatus};
