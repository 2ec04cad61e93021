//! # Notification Dispatcher
//!
//! Fans an [`AlertInfo`] out to every configured channel concurrently and
//! waits for all attempts to settle. A failing channel never aborts the
//! others and never propagates: failures are logged and collected in the
//! returned [`DispatchReport`].
//!
//! Deduplication is not done here; the alert engine gates calls with its
//! cool-down window.

mod error;
mod mail;
mod template;
mod webhook;

pub use error::NotificationError;
pub use mail::{ComposedMail, MailComposer, MailNotifier, MailtoComposer};
pub use template::{
    TIMESTAMP_FORMAT, mail_body_html, mail_subject, webhook_markdown, webhook_payload,
};
pub use webhook::{WEBHOOK_CONNECT_TIMEOUT, WEBHOOK_TIMEOUT, WebhookNotifier, create_client};

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::alert::AlertInfo;
use crate::config::PanelOptions;

/// Fully configured webhook channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookChannel {
    pub url: String,
}

/// Fully configured mail channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailChannel {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub recipient: String,
    /// Supports `{type}` and `{message}`
    pub subject_template: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationChannelConfig {
    Webhook(WebhookChannel),
    Mail(MailChannel),
}

impl NotificationChannelConfig {
    /// The enabled, fully configured channels of `options`
    pub fn from_options(options: &PanelOptions) -> Vec<Self> {
        options
            .webhook_channel()
            .map(Self::Webhook)
            .into_iter()
            .chain(options.mail_channel().map(Self::Mail))
            .collect()
    }
}

/// An external alert channel
#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    /// Short channel name used in logs and reports
    fn channel_name(&self) -> &str;

    async fn notify(&self, alert: &AlertInfo) -> Result<(), NotificationError>;
}

/// Outcome of one dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub delivered: Vec<String>,
    /// Channel name and failure reason
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    /// Nothing was attempted
    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty() && self.failed.is_empty()
    }

    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotificationDispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Build notifiers for `channels`, using [`create_client`] for webhooks
    /// and [`MailtoComposer`] for mail.
    pub fn from_channels(
        channels: impl IntoIterator<Item = NotificationChannelConfig>,
    ) -> Result<Self, NotificationError> {
        let mut dispatcher = Self::new();
        let mut client: Option<reqwest::Client> = None;

        for channel in channels {
            let notifier: Arc<dyn Notifier> = match channel {
                NotificationChannelConfig::Webhook(webhook) => {
                    let http = match &client {
                        Some(shared) => shared.clone(),
                        None => {
                            let created = create_client()?;
                            client = Some(created.clone());
                            created
                        }
                    };
                    Arc::new(WebhookNotifier::new(webhook, http))
                }
                NotificationChannelConfig::Mail(mail) => {
                    Arc::new(MailNotifier::new(mail, Arc::new(MailtoComposer::new())))
                }
            };
            debug!(channel = notifier.channel_name(), "Notification channel configured");
            dispatcher.notifiers.push(notifier);
        }

        Ok(dispatcher)
    }

    pub fn from_options(options: &PanelOptions) -> Result<Self, NotificationError> {
        Self::from_channels(NotificationChannelConfig::from_options(options))
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.notifiers.iter().map(|n| n.channel_name()).collect()
    }

    /// Send `alert` on every channel and wait for all of them to settle.
    pub async fn dispatch(&self, alert: &AlertInfo) -> DispatchReport {
        let mut report = DispatchReport::default();
        if self.notifiers.is_empty() {
            return report;
        }

        let attempts = self.notifiers.iter().map(|notifier| async move {
            (notifier.channel_name().to_owned(), notifier.notify(alert).await)
        });

        for (channel, result) in join_all(attempts).await {
            match result {
                Ok(()) => {
                    info!(channel = %channel, alert_type = %alert.alert_type, "External alert sent");
                    report.delivered.push(channel);
                }
                Err(e) => {
                    warn!(channel = %channel, error = %e, "External alert failed");
                    report.failed.push((channel, e.to_string()));
                }
            }
        }

        report
    }
}
