//! Message formatting shared by the channels. Every message carries the
//! human-readable type, the formatted time, the stream URL, the raw message
//! and both counters.

use std::sync::LazyLock;

use minijinja::{Environment, UndefinedBehavior};
use serde_json::{Value, json};
use tracing::warn;

use super::NotificationError;
use crate::alert::{AlertInfo, AlertType};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(alert: &AlertInfo) -> String {
    alert.timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Chat-bot markdown card
pub fn webhook_payload(alert: &AlertInfo) -> Value {
    json!({
        "msgtype": "markdown",
        "markdown": {
            "title": format!("Live stream alert - {}", alert.alert_type),
            "text": webhook_markdown(alert),
        }
    })
}

pub fn webhook_markdown(alert: &AlertInfo) -> String {
    format!(
        "## Live stream alert\n\n\
         **Alert type:** {}\n\
         **Alert time:** {}\n\
         **Stream URL:** {}\n\
         **Message:** {}\n\
         **Error count:** {}\n\
         **Retry count:** {}\n\n\
         Please check the stream status.",
        alert.alert_type.human_readable(),
        format_timestamp(alert),
        alert.stream_url,
        alert.message,
        alert.error_count,
        alert.retry_count,
    )
}

/// Substitute every `{type}` and `{message}` placeholder.
pub fn mail_subject(template: &str, alert: &AlertInfo) -> String {
    template
        .replace("{type}", alert.alert_type.human_readable())
        .replace("{message}", &alert.message)
}

fn severity_class(alert_type: AlertType) -> &'static str {
    match alert_type {
        AlertType::Error | AlertType::Connection => "error",
        AlertType::Buffer => "warning",
    }
}

/// The `.html` suffix turns on auto-escaping for every interpolated value.
const MAIL_BODY_NAME: &str = "mail_body.html";
const MAIL_BODY_TEMPLATE: &str = include_str!("templates/mail_body.html");

static TEMPLATES: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env
});

pub fn mail_body_html(alert: &AlertInfo) -> Result<String, NotificationError> {
    let context = json!({
        "class": severity_class(alert.alert_type),
        "fields": [
            { "label": "Alert type", "value": alert.alert_type.human_readable() },
            { "label": "Alert time", "value": format_timestamp(alert) },
            { "label": "Stream URL", "value": alert.stream_url },
            { "label": "Message", "value": alert.message },
            { "label": "Error count", "value": alert.error_count },
            { "label": "Retry count", "value": alert.retry_count },
        ],
    });

    TEMPLATES
        .render_named_str(MAIL_BODY_NAME, MAIL_BODY_TEMPLATE, context)
        .map_err(|e| {
            warn!(template = MAIL_BODY_NAME, error = %e, "Failed to render mail body");
            NotificationError::Template(e)
        })
}
