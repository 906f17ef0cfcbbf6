//! Input checks run before a job is submitted

use crate::error::TaskError;
use crate::types::AudioFormat;
use url::Url;

const ALLOWED_HOSTS: &[&str] = &["youtube.com", "youtu.be"];

/// Validate a video link before submitting it.
///
/// Accepts http(s) links on YouTube hosts (with or without `www.`/`m.`) that
/// carry a non-empty path. A missing scheme is treated as https.
pub fn validate_video_url(raw: &str) -> Result<Url, TaskError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(TaskError::Validation("url must not be empty".to_string()));
    }

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let url = Url::parse(&candidate)
        .map_err(|e| TaskError::Validation(format!("malformed url: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(TaskError::Validation(format!(
            "unsupported scheme: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(&host);
    if !ALLOWED_HOSTS.contains(&host) {
        return Err(TaskError::Validation(format!("unsupported host: {host}")));
    }

    if url.path().trim_matches('/').is_empty() {
        return Err(TaskError::Validation(
            "url does not point to a video".to_string(),
        ));
    }

    Ok(url)
}

/// Validate a requested output format
pub fn validate_format(raw: &str) -> Result<AudioFormat, TaskError> {
    AudioFormat::parse(raw)
        .ok_or_else(|| TaskError::Validation(format!("unsupported audio format: {raw}")))
}
