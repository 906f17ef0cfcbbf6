//! User-facing task operations: submit, retrieve, delete

use crate::api::{AudioFile, TaskApi};
use crate::error::{Result, TaskError};
use crate::store::TaskStore;
use crate::types::{CreateTaskRequest, Task, TaskPatch};
use crate::validation::{validate_format, validate_video_url};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Front door for the presentation layer.
///
/// Mutates the registry only through [`TaskStore`]; the polling scheduler
/// picks up whatever this adds.
pub struct TaskManager {
    store: Arc<TaskStore>,
    api: Arc<dyn TaskApi>,
}

impl TaskManager {
    pub fn new(store: Arc<TaskStore>, api: Arc<dyn TaskApi>) -> Self {
        Self { store, api }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Validate and submit a new job, registering it as queued.
    ///
    /// Nothing is sent and the registry is untouched if validation fails.
    pub async fn submit(&self, url: &str, format: &str) -> Result<Task> {
        let video_url = validate_video_url(url)?;
        let format = validate_format(format)?;

        let request = CreateTaskRequest {
            url: video_url.to_string(),
            format,
        };
        let task_id = self.api.create_task(&request).await.map_err(|e| {
            warn!(url = %request.url, error = %e, "Task creation failed");
            e
        })?;

        let created_at = Utc::now().timestamp_millis() as f64 / 1000.0;
        let task = self
            .store
            .upsert(
                &task_id,
                TaskPatch::submitted(&request.url, format, created_at),
            )
            .await;

        info!(task_id = %task.id, format = %format, "Task submitted");
        Ok(task)
    }

    /// Retrieve the finished file and drop the task from the registry
    pub async fn download(&self, task_id: &str) -> Result<(Task, AudioFile)> {
        let task = self.known_task(task_id).await?;
        let audio = with_format_type(&task, self.api.download(task_id).await?);

        self.store.remove(task_id).await;
        info!(task_id, size = audio.data.len(), "Audio downloaded, task removed");
        Ok((task, audio))
    }

    /// Retrieve the file for playback; the task stays registered
    pub async fn play(&self, task_id: &str) -> Result<(Task, AudioFile)> {
        let task = self.known_task(task_id).await?;
        let audio = with_format_type(&task, self.api.play(task_id).await?);
        Ok((task, audio))
    }

    /// Explicit user deletion; local only
    pub async fn delete(&self, task_id: &str) -> Option<Task> {
        self.store.remove(task_id).await
    }

    async fn known_task(&self, task_id: &str) -> Result<Task> {
        self.store
            .get(task_id)
            .await
            .ok_or_else(|| TaskError::UnknownTask(task_id.to_string()))
    }
}

/// Fill in the requested format's MIME type when the server sent none
fn with_format_type(task: &Task, mut audio: AudioFile) -> AudioFile {
    let untyped = audio.content_type.is_empty() || audio.content_type == "application/octet-stream";
    if untyped {
        audio.content_type = task.audio_format().mime_type().to_string();
    }
    audio
}
