//! Scripted job-processor fake shared by the unit tests

use crate::api::{AudioFile, TaskApi};
use crate::error::{Result, TaskError};
use crate::store::TaskStore;
use crate::types::{CreateTaskRequest, TaskPatch};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

type Scripted = std::result::Result<TaskPatch, String>;

#[derive(Default)]
pub(crate) struct FakeTaskApi {
    next_ids: Mutex<VecDeque<std::result::Result<String, String>>>,
    created: Mutex<Vec<CreateTaskRequest>>,
    statuses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    polled: Mutex<Vec<String>>,
    audio: Mutex<HashMap<String, AudioFile>>,
    retrieved: Mutex<Vec<String>>,
    remove_on_poll: Option<Arc<TaskStore>>,
}

impl FakeTaskApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Remove each polled task from `store` before answering
    pub(crate) fn removing_from(mut self, store: Arc<TaskStore>) -> Self {
        self.remove_on_poll = Some(store);
        self
    }

    pub(crate) fn next_create(&self, result: std::result::Result<&str, &str>) {
        self.next_ids
            .lock()
            .unwrap()
            .push_back(result.map(str::to_string).map_err(str::to_string));
    }

    /// Responses for successive polls of `task_id`; the last one repeats
    pub(crate) fn script(&self, task_id: &str, responses: Vec<Scripted>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(task_id.to_string(), responses.into());
    }

    pub(crate) fn serve_audio(&self, task_id: &str, data: &[u8]) {
        self.serve_audio_as(task_id, data, "audio/mpeg");
    }

    pub(crate) fn serve_audio_as(&self, task_id: &str, data: &[u8], content_type: &str) {
        self.audio.lock().unwrap().insert(
            task_id.to_string(),
            AudioFile {
                data: data.to_vec(),
                content_type: content_type.to_string(),
                file_name: None,
            },
        );
    }

    pub(crate) fn created(&self) -> Vec<CreateTaskRequest> {
        self.created.lock().unwrap().clone()
    }

    pub(crate) fn polled(&self) -> Vec<String> {
        self.polled.lock().unwrap().clone()
    }

    pub(crate) fn retrieved(&self) -> Vec<String> {
        self.retrieved.lock().unwrap().clone()
    }

    fn audio_for(&self, task_id: &str) -> Result<AudioFile> {
        self.retrieved.lock().unwrap().push(task_id.to_string());
        self.audio
            .lock()
            .unwrap()
            .get(task_id)
            .cloned()
            .ok_or_else(|| TaskError::Retrieval {
                task_id: task_id.to_string(),
                message: "file not found".to_string(),
            })
    }
}

#[async_trait]
impl TaskApi for FakeTaskApi {
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<String> {
        self.created.lock().unwrap().push(request.clone());
        match self.next_ids.lock().unwrap().pop_front() {
            Some(Ok(id)) => Ok(id),
            Some(Err(message)) => Err(TaskError::CreateTask(message)),
            None => Err(TaskError::CreateTask("no scripted id".to_string())),
        }
    }

    async fn get_task(&self, task_id: &str) -> Result<TaskPatch> {
        self.polled.lock().unwrap().push(task_id.to_string());

        if let Some(store) = &self.remove_on_poll {
            store.remove(task_id).await;
        }

        let next = {
            let mut statuses = self.statuses.lock().unwrap();
            let queue = statuses.get_mut(task_id);
            match queue {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match next {
            Some(Ok(patch)) => Ok(patch),
            Some(Err(message)) => Err(TaskError::Poll {
                task_id: task_id.to_string(),
                message,
            }),
            None => Err(TaskError::Poll {
                task_id: task_id.to_string(),
                message: "task not found".to_string(),
            }),
        }
    }

    async fn download(&self, task_id: &str) -> Result<AudioFile> {
        self.audio_for(task_id)
    }

    async fn play(&self, task_id: &str) -> Result<AudioFile> {
        self.audio_for(task_id)
    }
}
