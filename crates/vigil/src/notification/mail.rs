//! Mail channel.
//!
//! The message is composed here and handed to a [`MailComposer`]. Success
//! means the handoff succeeded, not that the mail was delivered.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::template::{mail_body_html, mail_subject};
use super::{MailChannel, NotificationError, Notifier};
use crate::alert::AlertInfo;

/// A fully composed message ready for handoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// The host's mail composition facility
#[async_trait]
pub trait MailComposer: Send + Sync + Debug {
    async fn compose(&self, mail: &ComposedMail) -> Result<(), NotificationError>;
}

/// Opens a `mailto:` link with the platform opener.
#[derive(Debug, Clone, Default)]
pub struct MailtoComposer;

impl MailtoComposer {
    pub fn new() -> Self {
        Self
    }

    pub fn link(mail: &ComposedMail) -> String {
        format!(
            "mailto:{}?subject={}&body={}",
            mail.to,
            urlencoding::encode(&mail.subject),
            urlencoding::encode(&mail.html_body)
        )
    }

    fn opener(link: &str) -> Option<Command> {
        if cfg!(target_os = "linux") {
            let mut command = Command::new("xdg-open");
            command.arg(link);
            Some(command)
        } else if cfg!(target_os = "macos") {
            let mut command = Command::new("open");
            command.arg(link);
            Some(command)
        } else if cfg!(target_os = "windows") {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", "", link]);
            Some(command)
        } else {
            None
        }
    }
}

#[async_trait]
impl MailComposer for MailtoComposer {
    async fn compose(&self, mail: &ComposedMail) -> Result<(), NotificationError> {
        let link = Self::link(mail);
        let mut command = Self::opener(&link).ok_or(NotificationError::MailUnsupported)?;

        let status = command
            .status()
            .await
            .map_err(|e| NotificationError::MailHandoff(e.to_string()))?;
        if !status.success() {
            return Err(NotificationError::MailHandoff(format!(
                "opener exited with {status}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MailNotifier {
    channel: MailChannel,
    composer: Arc<dyn MailComposer>,
}

impl MailNotifier {
    pub fn new(channel: MailChannel, composer: Arc<dyn MailComposer>) -> Self {
        Self { channel, composer }
    }

    pub fn compose(&self, alert: &AlertInfo) -> Result<ComposedMail, NotificationError> {
        Ok(ComposedMail {
            from: self.channel.username.clone(),
            to: self.channel.recipient.clone(),
            subject: mail_subject(&self.channel.subject_template, alert),
            html_body: mail_body_html(alert)?,
        })
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    fn channel_name(&self) -> &str {
        "mail"
    }

    async fn notify(&self, alert: &AlertInfo) -> Result<(), NotificationError> {
        let mail = self.compose(alert)?;
        debug!(
            server = %self.channel.server,
            port = self.channel.port,
            to = %mail.to,
            "Handing off alert mail"
        );
        self.composer.compose(&mail).await
    }
}
