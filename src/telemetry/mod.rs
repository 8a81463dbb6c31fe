//! Telemetry - pushing readings to remote feeds
//!
//! `TelemetrySink` is the capability the loop talks to; `adafruit` is the
//! Adafruit IO implementation.

pub mod adafruit;
pub mod feeds;
pub mod upload;

use serde::Deserialize;
use std::fmt;

/// `AIO_UPLOAD` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// Upload, creating missing feeds
    #[default]
    Yes,
    /// Upload, but refuse to start if a feed is missing
    Force,
    /// Never touch the network
    No,
}

impl UploadMode {
    pub fn enabled(self) -> bool {
        !matches!(self, UploadMode::No)
    }
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UploadMode::Yes => "yes",
            UploadMode::Force => "force",
            UploadMode::No => "no",
        })
    }
}

/// A remote feed as returned by the service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Feed {
    pub key: String,
    #[serde(default)]
    pub name: String,
}

impl Feed {
    /// Feed known only by key, not confirmed with the service
    pub fn unresolved(key: &str) -> Self {
        Self {
            key: key.to_string(),
            name: key.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("feed '{0}' not found")]
    NotFound(String),

    #[error("rate limited by telemetry service")]
    Throttled,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("telemetry service returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Remote feed service
#[allow(async_fn_in_trait)]
pub trait TelemetrySink {
    /// Fetch an existing feed; `NotFound` if there is none
    async fn lookup_feed(&self, key: &str) -> Result<Feed, TelemetryError>;

    async fn create_feed(&self, key: &str) -> Result<Feed, TelemetryError>;

    /// Append one value to a feed
    async fn push(&self, feed: &Feed, value: f64) -> Result<(), TelemetryError>;
}
