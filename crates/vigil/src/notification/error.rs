/// Errors raised by notification channels.
///
/// These never leave the dispatcher; they are recorded in the
/// [`DispatchReport`](super::DispatchReport) and logged.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook returned HTTP {status}")]
    Status { status: u16 },

    #[error("Webhook rejected the message (errcode {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Webhook response carries no result code")]
    MissingResultCode,

    #[error("Mail handoff failed: {0}")]
    MailHandoff(String),

    #[error("Mail handoff is not supported on this platform")]
    MailUnsupported,

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("Template rendering failed: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
