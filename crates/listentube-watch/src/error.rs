//! Error types for the watch CLI

use listentube_tasks::{TaskError, TaskStatus};
use std::fmt;

#[derive(Debug)]
pub enum WatchError {
    Task(TaskError),
    /// The job ended without producing audio
    TaskFailed {
        task_id: String,
        status: TaskStatus,
        message: Option<String>,
    },
    /// Event stream closed before the task finished
    Interrupted,
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchError::Task(err) => write!(f, "{}", err),
            WatchError::TaskFailed {
                task_id,
                status,
                message: Some(message),
            } => write!(f, "Task {} ended as {}: {}", task_id, status, message),
            WatchError::TaskFailed {
                task_id, status, ..
            } => write!(f, "Task {} ended as {}", task_id, status),
            WatchError::Interrupted => write!(f, "Stopped before the task finished"),
            WatchError::Io(err) => write!(f, "IO error: {}", err),
            WatchError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for WatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WatchError::Task(err) => Some(err),
            WatchError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<TaskError> for WatchError {
    fn from(err: TaskError) -> Self {
        WatchError::Task(err)
    }
}

impl From<std::io::Error> for WatchError {
    fn from(err: std::io::Error) -> Self {
        WatchError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for WatchError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        WatchError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
