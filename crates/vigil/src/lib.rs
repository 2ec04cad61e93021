//! # Vigil
//!
//! A health monitor for live media streams. Vigil consumes the events of a
//! media element and of the format decoder feeding it, folds them into a
//! playback health snapshot, and raises alerts in the panel and on external
//! channels (chat-bot webhooks, mail) when playback degrades.
//!
//! ## Features
//!
//! - Source resolution from tabular series data with a configured fallback
//! - URL-based decoder selection (HLS, FLV, native) behind one event contract
//! - Health state machine over play/pause/error/waiting/canplay/stalled
//! - Threshold-based error and buffering monitors, immediate stall alerts
//! - Best-effort external fan-out with a cool-down gate
//! - Bounded diagnostic log and a read-only presentation snapshot

pub mod alert;
pub mod builder;
pub mod config;
pub mod decoder;
pub mod diagnostic;
pub mod error;
pub mod factory;
pub mod monitor;
pub mod notification;
pub mod session;
pub mod snapshot;
pub mod sound;
pub mod source;
pub mod status;

pub use builder::PanelOptionsBuilder;
pub use config::{AlertPolicyConfig, PanelOptions};
pub use error::MonitorError;

// Re-export the health model
pub use alert::{AlertEffect, AlertEngine, AlertInfo, AlertState, AlertType};
pub use diagnostic::{DiagnosticLog, DiagnosticLogEntry};
pub use status::{HealthSignal, MediaEvent, StreamStatus, Transition};

// Re-export decoder plumbing
pub use decoder::{
    DecoderError, DecoderEvent, DecoderEventSender, DecoderKind, DecoderMessage, FlvBackend,
    HlsBackend, MediaSink, StreamDecoder, classify_url,
};
pub use factory::{DecoderFactory, DecoderInstance};

// Re-export notification types
pub use notification::{
    DispatchReport, MailChannel, NotificationChannelConfig, NotificationDispatcher,
    NotificationError, Notifier, WebhookChannel,
};

pub use monitor::StreamMonitor;
pub use session::{PanelHandle, PanelInput, PanelSession};
pub use snapshot::PanelSnapshot;
pub use sound::{AlertSound, Silent, SoundError, TerminalBell};
pub use source::{DataSeries, SeriesField, SourceChange, SourceSelector, resolve_sources};
