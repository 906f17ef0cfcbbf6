//! Error types for the offline cache

use std::fmt;

#[derive(Debug)]
pub enum OfflineError {
    /// The network request itself failed (no response)
    Network(String),
    /// Audio retrieval failed and the audio tier had no fallback
    Retrieval { key: String, reason: String },
    /// A static asset could not be primed during install
    InstallPrime { asset: String, reason: String },
    Store(String),
    Io(Box<std::io::Error>),
    Serialization(String),
}

impl fmt::Display for OfflineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfflineError::Network(msg) => write!(f, "Network error: {}", msg),
            OfflineError::Retrieval { key, reason } => {
                write!(f, "Retrieval failed for {} with no cached copy: {}", key, reason)
            }
            OfflineError::InstallPrime { asset, reason } => {
                write!(f, "Failed to prime static asset {}: {}", asset, reason)
            }
            OfflineError::Store(msg) => write!(f, "Blob store error: {}", msg),
            OfflineError::Io(err) => write!(f, "IO error: {}", err),
            OfflineError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for OfflineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OfflineError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OfflineError {
    fn from(err: std::io::Error) -> Self {
        OfflineError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for OfflineError {
    fn from(err: serde_json::Error) -> Self {
        OfflineError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for OfflineError {
    fn from(err: reqwest::Error) -> Self {
        OfflineError::Network(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OfflineError>;
