//! # Builder for PanelOptions
//!
//! Fluent construction of [`PanelOptions`], used by embedding hosts that do
//! not deserialize the options from a dashboard document.
//!
//! # Example
//!
//! ```
//! use vigil_engine::PanelOptions;
//!
//! let options = PanelOptions::builder()
//!     .with_video_url("http://cdn.example.com/live/stream.m3u8")
//!     .with_error_threshold(2)
//!     .with_buffer_threshold(15)
//!     .with_webhook("https://robot.example.com/send?access_token=token")
//!     .build();
//!
//! assert!(options.webhook_channel().is_some());
//! ```

use crate::PanelOptions;

/// Builder for creating PanelOptions instances with a fluent API
#[derive(Debug, Clone, Default)]
pub struct PanelOptionsBuilder {
    options: PanelOptions,
}

impl PanelOptionsBuilder {
    /// Create a new builder with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback stream URL
    pub fn with_video_url(mut self, url: impl Into<String>) -> Self {
        self.options.video_url = url.into();
        self
    }

    /// Set the series field name holding stream URLs
    pub fn with_url_field(mut self, field: impl Into<String>) -> Self {
        self.options.url_field = field.into();
        self
    }

    /// Enable or disable alerting altogether
    pub fn with_alerts_enabled(mut self, enabled: bool) -> Self {
        self.options.enable_alerts = enabled;
        self
    }

    pub fn with_error_threshold(mut self, count: u32) -> Self {
        self.options.error_threshold = count;
        self
    }

    /// Set the buffering threshold in seconds
    pub fn with_buffer_threshold(mut self, seconds: u32) -> Self {
        self.options.buffer_threshold = seconds;
        self
    }

    pub fn with_sound(mut self, enabled: bool) -> Self {
        self.options.alert_sound = enabled;
        self
    }

    pub fn with_visual(mut self, enabled: bool) -> Self {
        self.options.alert_visual = enabled;
        self
    }

    /// Enable the webhook channel with the given robot URL
    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.options.enable_webhook = true;
        self.options.webhook_url = url.into();
        self
    }

    /// Enable the mail channel
    pub fn with_mail(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        self.options.enable_email = true;
        self.options.email_username = username.into();
        self.options.email_password = password.into();
        self.options.email_to = recipient.into();
        self
    }

    /// Set the SMTP server and port used by the mail channel
    pub fn with_mail_server(mut self, server: impl Into<String>, port: u16) -> Self {
        self.options.email_server = server.into();
        self.options.email_port = port;
        self
    }

    /// Set the mail subject template (`{type}` and `{message}` are substituted)
    pub fn with_mail_subject(mut self, template: impl Into<String>) -> Self {
        self.options.email_subject = template.into();
        self
    }

    pub fn with_external_cooldown_secs(mut self, seconds: u64) -> Self {
        self.options.external_cooldown_secs = seconds;
        self
    }

    pub fn with_buffer_check_interval_ms(mut self, millis: u64) -> Self {
        self.options.buffer_check_interval_ms = millis;
        self
    }

    /// Build the options
    pub fn build(self) -> PanelOptions {
        self.options
    }
}
