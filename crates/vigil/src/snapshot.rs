//! Read-only presentation state of a panel.

use serde::Serialize;

use crate::alert::AlertState;
use crate::diagnostic::DiagnosticLogEntry;
use crate::source::SourceSelector;
use crate::status::StreamStatus;

pub const COLOR_ALERTING: &str = "#ff0000";
pub const COLOR_ERROR: &str = "#ff4444";
pub const COLOR_BUFFERING: &str = "#ffaa00";
pub const COLOR_PLAYING: &str = "#44ff44";
pub const COLOR_IDLE: &str = "#888888";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelSnapshot {
    pub status_color: String,
    pub status_label: String,
    /// Banner shown while an alert is active
    pub alert_banner: Option<String>,
    /// Error text shown while failed but not alerting
    pub error_text: Option<String>,
    /// Full-panel alert overlay
    pub overlay: bool,
    pub retry_count: u32,
    pub consecutive_errors: u32,
    pub last_update: String,
    pub channel_summary: String,
    pub log: Vec<DiagnosticLogEntry>,
    pub sources: Vec<String>,
    pub current_source: Option<String>,
    pub show_source_selector: bool,
}

impl PanelSnapshot {
    pub fn build(
        status: &StreamStatus,
        alert: &AlertState,
        visual_alerts: bool,
        channels: &[&str],
        log: Vec<DiagnosticLogEntry>,
        selector: &SourceSelector,
    ) -> Self {
        let (status_color, status_label) = if alert.is_alerting {
            (COLOR_ALERTING, "Alerting")
        } else if status.is_error {
            (COLOR_ERROR, "Error")
        } else if status.is_buffering {
            (COLOR_BUFFERING, "Buffering")
        } else if status.is_playing {
            (COLOR_PLAYING, "Playing")
        } else {
            (COLOR_IDLE, "Idle")
        };

        let alert_banner = alert.is_alerting.then(|| {
            let kind = alert.alert_type.map(|t| t.human_readable()).unwrap_or("Alert");
            format!("{kind}: {}", alert.alert_message)
        });
        let error_text =
            (status.is_error && !alert.is_alerting).then(|| status.error_message.clone());

        let channel_summary = if channels.is_empty() {
            "no external alerts configured".to_string()
        } else {
            format!("{} alerts configured", channels.join(" "))
        };

        Self {
            status_color: status_color.to_string(),
            status_label: status_label.to_string(),
            alert_banner,
            error_text,
            overlay: alert.is_alerting && visual_alerts,
            retry_count: status.retry_count,
            consecutive_errors: alert.consecutive_errors,
            last_update: status.last_update.format("%H:%M:%S").to_string(),
            channel_summary,
            log,
            sources: selector.sources().to_vec(),
            current_source: selector.current().map(str::to_owned),
            show_source_selector: selector.has_multiple(),
        }
    }
}
