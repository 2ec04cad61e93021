use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::MonitorError;
use crate::notification::{MailChannel, WebhookChannel};
use crate::source::DEFAULT_URL_FIELD;

pub const DEFAULT_EMAIL_SERVER: &str = "smtp.qq.com";
pub const DEFAULT_EMAIL_PORT: u16 = 587;
pub const DEFAULT_EMAIL_SUBJECT: &str = "Live stream alert: {type} - {message}";

/// Minimum time between two external dispatches for the same source.
pub const DEFAULT_EXTERNAL_COOLDOWN_SECS: u64 = 5 * 60;

/// Panel options as edited in the host dashboard.
///
/// Every option is independently toggleable. Thresholds set to zero are
/// treated as "not configured" and disable the corresponding monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelOptions {
    /// Fallback stream URL used when the series data yields no source
    pub video_url: String,
    /// Name of the series field carrying stream URLs
    pub url_field: String,

    pub enable_alerts: bool,
    /// Consecutive error observations before an error alert is raised
    pub error_threshold: u32,
    /// Buffering duration in seconds before a buffer alert is raised
    pub buffer_threshold: u32,
    pub alert_sound: bool,
    pub alert_visual: bool,

    pub enable_webhook: bool,
    pub webhook_url: String,

    pub enable_email: bool,
    pub email_server: String,
    pub email_port: u16,
    pub email_username: String,
    pub email_password: String,
    pub email_to: String,
    /// Subject template, supports `{type}` and `{message}`
    pub email_subject: String,

    /// Cool-down between external dispatches, in seconds
    pub external_cooldown_secs: u64,
    /// Interval of the periodic buffering re-evaluation, in milliseconds
    pub buffer_check_interval_ms: u64,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self {
            video_url: String::new(),
            url_field: DEFAULT_URL_FIELD.to_owned(),
            enable_alerts: true,
            error_threshold: 3,
            buffer_threshold: 10,
            alert_sound: true,
            alert_visual: true,
            enable_webhook: false,
            webhook_url: String::new(),
            enable_email: false,
            email_server: DEFAULT_EMAIL_SERVER.to_owned(),
            email_port: DEFAULT_EMAIL_PORT,
            email_username: String::new(),
            email_password: String::new(),
            email_to: String::new(),
            email_subject: DEFAULT_EMAIL_SUBJECT.to_owned(),
            external_cooldown_secs: DEFAULT_EXTERNAL_COOLDOWN_SECS,
            buffer_check_interval_ms: 1000,
        }
    }
}

impl PanelOptions {
    pub fn builder() -> crate::builder::PanelOptionsBuilder {
        crate::builder::PanelOptionsBuilder::new()
    }

    /// Reject option combinations the monitor cannot run with.
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.enable_email && self.email_port == 0 {
            return Err(MonitorError::Config(
                "email_port must be greater than zero".to_string(),
            ));
        }
        if self.enable_email && self.email_subject.trim().is_empty() {
            return Err(MonitorError::Config(
                "email_subject must not be empty".to_string(),
            ));
        }
        if let Some(channel) = self.webhook_channel() {
            let parsed = url::Url::parse(&channel.url)
                .map_err(|e| MonitorError::Config(format!("invalid webhook_url: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(MonitorError::Config(format!(
                    "webhook_url must use http or https, got {}",
                    parsed.scheme()
                )));
            }
        }
        if self.buffer_check_interval_ms == 0 {
            return Err(MonitorError::Config(
                "buffer_check_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.external_cooldown_secs == 0 {
            return Err(MonitorError::Config(
                "external_cooldown_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Alerting knobs consumed by the alert engine.
    pub fn alert_policy(&self) -> AlertPolicyConfig {
        AlertPolicyConfig {
            enabled: self.enable_alerts,
            error_threshold: (self.error_threshold > 0).then_some(self.error_threshold),
            buffer_threshold: (self.buffer_threshold > 0)
                .then(|| Duration::from_secs(u64::from(self.buffer_threshold))),
            sound: self.alert_sound,
            visual: self.alert_visual,
            external_cooldown: Duration::from_secs(self.external_cooldown_secs),
        }
    }

    /// The webhook channel, if enabled and fully configured.
    pub fn webhook_channel(&self) -> Option<WebhookChannel> {
        if !self.enable_webhook || self.webhook_url.trim().is_empty() {
            return None;
        }
        Some(WebhookChannel {
            url: self.webhook_url.trim().to_owned(),
        })
    }

    /// The mail channel, if enabled with a recipient and a username.
    ///
    /// Server, port and subject fall back to their defaults when left empty.
    pub fn mail_channel(&self) -> Option<MailChannel> {
        if !self.enable_email || self.email_to.is_empty() || self.email_username.is_empty() {
            return None;
        }
        Some(MailChannel {
            server: non_empty_or(&self.email_server, DEFAULT_EMAIL_SERVER),
            port: if self.email_port == 0 {
                DEFAULT_EMAIL_PORT
            } else {
                self.email_port
            },
            username: self.email_username.clone(),
            password: self.email_password.clone(),
            recipient: self.email_to.clone(),
            subject_template: non_empty_or(&self.email_subject, DEFAULT_EMAIL_SUBJECT),
        })
    }

    pub fn buffer_check_interval(&self) -> Duration {
        Duration::from_millis(self.buffer_check_interval_ms.max(1))
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_owned()
    } else {
        value.to_owned()
    }
}

/// Derived alerting configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertPolicyConfig {
    /// Master switch; when off nothing is triggered
    pub enabled: bool,
    pub error_threshold: Option<u32>,
    pub buffer_threshold: Option<Duration>,
    pub sound: bool,
    pub visual: bool,
    pub external_cooldown: Duration,
}

impl Default for AlertPolicyConfig {
    fn default() -> Self {
        PanelOptions::default().alert_policy()
    }
}
