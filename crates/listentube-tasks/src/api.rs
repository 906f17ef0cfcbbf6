//! HTTP client for the job processor

use crate::error::{Result, TaskError};
use crate::types::{CreateTaskRequest, TaskPatch};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Retrieved audio payload
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFile {
    pub data: Vec<u8>,
    pub content_type: String,
    /// Name suggested by the server's `Content-Disposition`, if any
    pub file_name: Option<String>,
}

/// Operations the client consumes from the job processor
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// `POST /tasks`, returning the new task id
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<String>;

    /// `GET /tasks/{id}`
    async fn get_task(&self, task_id: &str) -> Result<TaskPatch>;

    /// `GET /tasks/{id}/download`
    async fn download(&self, task_id: &str) -> Result<AudioFile>;

    /// `GET /tasks/{id}/play`
    async fn play(&self, task_id: &str) -> Result<AudioFile>;
}

#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`TaskApi`] over HTTP
pub struct HttpTaskApi {
    client: Client,
    base_url: String,
}

impl HttpTaskApi {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn task_url(&self, task_id: &str) -> String {
        format!("{}/tasks/{}", self.base_url, urlencoding::encode(task_id))
    }

    async fn fetch_audio(&self, task_id: &str, action: &str) -> Result<AudioFile> {
        let url = format!("{}/{}", self.task_url(task_id), action);
        debug!(url = %url, "Retrieving audio");

        let retrieval = |message: String| TaskError::Retrieval {
            task_id: task_id.to_string(),
            message,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| retrieval(e.to_string()))?;

        if !response.status().is_success() {
            let message = error_message(response).await;
            warn!(task_id, action, error = %message, "Audio retrieval rejected");
            return Err(retrieval(message));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let file_name = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_file_name);

        let data = response
            .bytes()
            .await
            .map_err(|e| retrieval(e.to_string()))?
            .to_vec();

        debug!(task_id, size = data.len(), content_type = %content_type, "Retrieved audio");
        Ok(AudioFile {
            data,
            content_type,
            file_name,
        })
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<String> {
        let url = format!("{}/tasks", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| TaskError::CreateTask(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TaskError::CreateTask(error_message(response).await));
        }

        let body: CreateTaskResponse = response
            .json()
            .await
            .map_err(|e| TaskError::CreateTask(e.to_string()))?;
        Ok(body.id)
    }

    async fn get_task(&self, task_id: &str) -> Result<TaskPatch> {
        let poll = |message: String| TaskError::Poll {
            task_id: task_id.to_string(),
            message,
        };

        let response = self
            .client
            .get(self.task_url(task_id))
            .send()
            .await
            .map_err(|e| poll(e.to_string()))?;

        if !response.status().is_success() {
            return Err(poll(error_message(response).await));
        }

        response.json().await.map_err(|e| poll(e.to_string()))
    }

    async fn download(&self, task_id: &str) -> Result<AudioFile> {
        self.fetch_audio(task_id, "download").await
    }

    async fn play(&self, task_id: &str) -> Result<AudioFile> {
        self.fetch_audio(task_id, "play").await
    }
}

/// Prefer the server's `{error}` body, fall back to the status line
async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => format!("server returned status {}", status),
    }
}

fn disposition_file_name(header: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|part| {
        let value = part.strip_prefix("filename=")?;
        let value = value.trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}
