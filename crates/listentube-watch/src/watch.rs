//! Submit one job, follow it to a terminal status, save the result

use crate::error::{Result, WatchError};
use crate::format::{format_bytes, format_eta};
use listentube_tasks::{
    PollingScheduler, SchedulerEvent, StoreEvent, Task, TaskManager, TaskStatus,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Replace characters that would escape or break the output directory
fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn log_progress(task: &Task) {
    let speed = task
        .speed
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "--".to_string());

    info!(
        task_id = %task.id,
        status = %task.status,
        progress = %format!("{:.1}%", task.progress),
        downloaded = %format_bytes(task.downloaded_bytes),
        total = %format_bytes(task.total_bytes),
        speed = %speed,
        eta = %format_eta(task.eta),
        "Progress"
    );
}

/// Run one job end to end and return the path of the saved file.
///
/// The scheduler is spawned here and shut down once the job reaches a
/// terminal status.
pub async fn run(
    manager: &TaskManager,
    scheduler: Arc<PollingScheduler>,
    url: &str,
    format: &str,
    output_dir: &Path,
) -> Result<PathBuf> {
    let mut events = scheduler.subscribe();
    let mut updates = manager.store().subscribe();
    let handle = scheduler.clone().spawn();

    let task = manager.submit(url, format).await?;
    info!(task_id = %task.id, url = %task.url, format = %task.format, "Submitted");

    let terminal = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SchedulerEvent::Terminated(done)) if done.id == task.id => break done,
                Ok(SchedulerEvent::PollFailed { task_id, message }) if task_id == task.id => {
                    warn!(task_id = %task_id, error = %message, "Status check failed, retrying");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed scheduler events"),
                Err(RecvError::Closed) => return Err(WatchError::Interrupted),
            },
            update = updates.recv() => match update {
                Ok(StoreEvent::Updated(current)) if current.id == task.id => log_progress(&current),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return Err(WatchError::Interrupted),
            },
        }
    };

    handle.shutdown().await;
    log_progress(&terminal);

    if terminal.status != TaskStatus::Finished {
        return Err(WatchError::TaskFailed {
            task_id: terminal.id,
            status: terminal.status,
            message: terminal.error,
        });
    }

    let (task, audio) = manager.download(&task.id).await?;
    let name = match (&task.title, audio.file_name) {
        (None, Some(served)) => served,
        _ => task.file_name(),
    };

    tokio::fs::create_dir_all(output_dir).await?;
    let path = output_dir.join(safe_file_name(&name));
    tokio::fs::write(&path, &audio.data).await?;

    info!(
        path = %path.display(),
        size = %format_bytes(audio.data.len() as u64),
        content_type = %audio.content_type,
        "Saved audio"
    );
    Ok(path)
}
