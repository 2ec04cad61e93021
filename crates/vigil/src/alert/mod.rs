//! # Alerting
//!
//! Alert data model and the policy engine deciding when alerts are raised,
//! cleared and forwarded to external channels.

mod engine;

pub use engine::{AlertEngine, CONNECTION_INTERRUPTED_MESSAGE};

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Kind of the active alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Error,
    Buffer,
    Connection,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Buffer => "buffer",
            Self::Connection => "connection",
        }
    }

    /// Label used in notification messages
    pub fn human_readable(&self) -> &'static str {
        match self {
            Self::Error => "Playback error",
            Self::Buffer => "Buffering timeout",
            Self::Connection => "Connection interrupted",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived alerting status; at most one alert is active at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertState {
    pub is_alerting: bool,
    pub alert_type: Option<AlertType>,
    pub alert_message: String,
    pub alert_time: Option<DateTime<Local>>,
    pub consecutive_errors: u32,
    /// Set when buffering begins, cleared when it ends
    pub buffer_start_time: Option<DateTime<Local>>,
    /// Start time of the last external dispatch (cool-down gate)
    pub last_external_alert_time: Option<DateTime<Local>>,
}

/// Immutable snapshot handed to the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertInfo {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub message: String,
    pub stream_url: String,
    pub timestamp: DateTime<Local>,
    pub error_count: u32,
    pub retry_count: u32,
}

/// Side effects requested by the engine, executed by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertEffect {
    /// Best-effort audible alert
    PlaySound,
    /// Forward to external channels (already past the cool-down gate)
    Dispatch(AlertInfo),
    /// Append to the diagnostic log
    Log(String),
}
