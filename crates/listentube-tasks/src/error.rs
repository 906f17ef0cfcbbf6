//! Error types for task tracking

use std::fmt;

#[derive(Debug)]
pub enum TaskError {
    /// Input rejected before any request was sent
    Validation(String),
    /// The job processor refused to create a task
    CreateTask(String),
    /// A status query failed; the scheduler retries on its next tick
    Poll { task_id: String, message: String },
    /// Download or playback retrieval failed
    Retrieval { task_id: String, message: String },
    UnknownTask(String),
    Http(reqwest::Error),
}

impl TaskError {
    /// Whether the scheduler absorbs this error and keeps running
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TaskError::Poll { .. })
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Validation(msg) => write!(f, "Validation error: {}", msg),
            TaskError::CreateTask(msg) => write!(f, "Failed to create task: {}", msg),
            TaskError::Poll { task_id, message } => {
                write!(f, "Failed to poll task {}: {}", task_id, message)
            }
            TaskError::Retrieval { task_id, message } => {
                write!(f, "Failed to retrieve audio for task {}: {}", task_id, message)
            }
            TaskError::UnknownTask(id) => write!(f, "Unknown task: {}", id),
            TaskError::Http(err) => write!(f, "HTTP error: {}", err),
        }
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TaskError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TaskError {
    fn from(err: reqwest::Error) -> Self {
        TaskError::Http(err)
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;
