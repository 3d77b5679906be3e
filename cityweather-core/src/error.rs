use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Why a weather fetch failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("City name must not be empty")]
    EmptyCity,

    #[error("Request to OpenWeather failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("OpenWeather request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("OpenWeather request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to parse OpenWeather response: {0}")]
    Parse(String),
}

/// Coarse failure category used by the view state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Parse,
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Parse(_) => FailureKind::Parse,
            _ => FailureKind::Network,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Network => f.write_str("network error"),
            FailureKind::Parse => f.write_str("unexpected response"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location unavailable: {0}")]
    Unavailable(String),

    #[error("Reverse lookup failed: {0}")]
    Lookup(#[from] FetchError),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("No cached weather data")]
    Miss,

    #[error("Cached weather data is corrupt: {0}")]
    Corrupt(String),

    #[error("Unsupported cache format version {0}")]
    UnsupportedVersion(u32),

    #[error("Cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification permission not granted")]
    NotPermitted,

    #[error("Failed to deliver notification: {0}")]
    Delivery(String),
}
