//! Core types for task tracking

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Lifecycle status reported by the job processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Downloading,
    Finished,
    Error,
    Expired,
    Deleted,
}

impl TaskStatus {
    /// Terminal statuses are never polled again
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Finished | TaskStatus::Error | TaskStatus::Expired | TaskStatus::Deleted
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Finished => "finished",
            TaskStatus::Error => "error",
            TaskStatus::Expired => "expired",
            TaskStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transfer speed, either preformatted by the server or a raw rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Speed {
    Rate(f64),
    Text(String),
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speed::Rate(rate) => write!(f, "{:.0} B/s", rate),
            Speed::Text(text) => f.write_str(text),
        }
    }
}

/// Audio codecs the job processor can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    M4a,
    Opus,
}

impl AudioFormat {
    /// Parse a format tag or media type, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mp3" | "audio/mpeg" => Some(AudioFormat::Mp3),
            "m4a" | "aac" | "audio/mp4" => Some(AudioFormat::M4a),
            "opus" | "ogg" | "audio/ogg" => Some(AudioFormat::Opus),
            _ => None,
        }
    }

    /// Same as [`AudioFormat::parse`] but falls back to mp3 like the server does
    pub fn parse_lenient(value: &str) -> Self {
        Self::parse(value).unwrap_or(AudioFormat::Mp3)
    }

    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Opus => "opus",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Opus => "audio/ogg",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A job tracked in the local registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    /// Percentage in 0..=100, meaningful while downloading
    pub progress: f64,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub speed: Option<Speed>,
    /// Seconds remaining
    pub eta: Option<u64>,
    /// Epoch seconds
    pub created_at: f64,
    pub format: String,
    pub url: String,
    pub title: Option<String>,
    pub error: Option<String>,
}

impl Task {
    /// Blank queued record, used when a patch arrives for an unknown id
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: TaskStatus::Queued,
            progress: 0.0,
            downloaded_bytes: 0,
            total_bytes: 0,
            speed: None,
            eta: None,
            created_at: 0.0,
            format: AudioFormat::Mp3.extension().to_string(),
            url: String::new(),
            title: None,
            error: None,
        }
    }

    /// Merge the supplied fields, leaving everything else untouched
    pub fn apply(&mut self, patch: TaskPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(progress) = patch.progress {
            self.progress = progress.clamp(0.0, 100.0);
        }
        if let Some(downloaded) = patch.downloaded_bytes {
            self.downloaded_bytes = downloaded;
        }
        if let Some(total) = patch.total_bytes {
            self.total_bytes = total;
        }
        if let Some(speed) = patch.speed {
            self.speed = Some(speed);
        }
        if let Some(eta) = patch.eta {
            self.eta = eta;
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = created_at;
        }
        if let Some(format) = patch.format {
            self.format = format;
        }
        if let Some(url) = patch.url {
            self.url = url;
        }
        if let Some(title) = patch.title {
            self.title = Some(title);
        }
        if let Some(error) = patch.error {
            self.error = Some(error);
        }
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat::parse_lenient(&self.format)
    }

    /// Name to save the retrieved audio under
    pub fn file_name(&self) -> String {
        let stem = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("audio");
        format!("{}.{}", stem, self.audio_format().extension())
    }
}

/// Partial task state; `None` means "not supplied".
///
/// Server status responses deserialize straight into a patch, so fields the
/// server omits never overwrite local state.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TaskPatch {
    pub id: Option<String>,
    pub status: Option<TaskStatus>,
    pub progress: Option<f64>,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub speed: Option<Speed>,
    /// `Some(None)` clears the eta
    #[serde(deserialize_with = "deserialize_eta")]
    pub eta: Option<Option<u64>>,
    pub created_at: Option<f64>,
    pub format: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub error: Option<String>,
}

impl TaskPatch {
    /// State recorded locally right after a successful submission
    pub fn submitted(url: &str, format: AudioFormat, created_at: f64) -> Self {
        Self {
            status: Some(TaskStatus::Queued),
            progress: Some(0.0),
            downloaded_bytes: Some(0),
            total_bytes: Some(0),
            speed: Some(Speed::Text("waiting".to_string())),
            eta: Some(None),
            created_at: Some(created_at),
            format: Some(format.extension().to_string()),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }
}

/// The server sends eta as a number, a numeric string, free text or null
fn deserialize_eta<'de, D>(deserializer: D) -> std::result::Result<Option<Option<u64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(Some(value.as_ref().and_then(eta_seconds)))
}

fn eta_seconds(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Body of `POST /tasks`
#[derive(Debug, Clone, Serialize)]
pub struct CreateTaskRequest {
    pub url: String,
    pub format: AudioFormat,
}
