use crate::decoder::DecoderError;
use crate::notification::NotificationError;

// Top-level error type for monitor operations
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Decoder error: {0}")]
    Decoder(#[from] DecoderError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Panel session is no longer running")]
    SessionClosed,
}
