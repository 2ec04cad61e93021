//! # Decoder Adapter
//!
//! Format-specific decoders (adaptive streaming over HLS manifests, flash
//! video over HTTP-FLV/RTMP) sit behind one event contract: a decoder reports
//! [`DecoderEvent::Ready`], [`DecoderEvent::DecodeError`] and
//! [`DecoderEvent::Destroyed`], tagged with the generation of the source it
//! was attached for. Anything not recognised by URL goes straight to the
//! media element.
//!
//! The concrete decoders are provided by the host through the
//! [`HlsBackend`] and [`FlvBackend`] capabilities.

mod error;
mod flv;
mod hls;
mod session;

pub use error::DecoderError;
pub use flv::{FlashVideoDecoder, FlvBackend, FlvEvent, FlvOptions, FlvPlayer, translate_flv_event};
pub use hls::{
    AdaptiveStreamingDecoder, HLS_MIME_TYPE, HlsBackend, HlsEvent, HlsOptions, translate_hls_event,
};
pub use session::{ActiveSession, BackendSession};

use std::fmt;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::mpsc;

static HLS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.m3u8($|\?)").expect("valid HLS url pattern"));
static FLV_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.flv($|\?)").expect("valid FLV url pattern"));

/// Which decoder handles a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderKind {
    /// Manifest-based adaptive streaming (HLS)
    AdaptiveStreaming,
    /// Flash video over HTTP or RTMP
    FlashVideo,
    /// Assigned directly to the media element
    Native,
}

impl DecoderKind {
    /// Short label used in status messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::AdaptiveStreaming => "HLS",
            Self::FlashVideo => "FLV",
            Self::Native => "native",
        }
    }
}

impl fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a stream URL.
///
/// A `.m3u8` suffix (optionally followed by a query string) selects the
/// adaptive-streaming decoder, a `.flv` suffix or an `rtmp` prefix selects the
/// flash-video decoder, everything else is played natively.
pub fn classify_url(url: &str) -> DecoderKind {
    if HLS_URL.is_match(url) {
        DecoderKind::AdaptiveStreaming
    } else if FLV_URL.is_match(url) || url.starts_with("rtmp") {
        DecoderKind::FlashVideo
    } else {
        DecoderKind::Native
    }
}

/// Uniform decoder event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderEvent {
    /// Manifest parsed / loading complete
    Ready,
    /// Decoder-reported failure with its detail string
    DecodeError { detail: String },
    /// The instance was torn down
    Destroyed,
}

/// A decoder event tagged with the source generation it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderMessage {
    pub generation: u64,
    pub kind: DecoderKind,
    pub event: DecoderEvent,
}

/// Sending half handed to a decoder on attach.
#[derive(Debug, Clone)]
pub struct DecoderEventSender {
    tx: mpsc::UnboundedSender<DecoderMessage>,
    generation: u64,
    kind: DecoderKind,
}

impl DecoderEventSender {
    pub fn new(
        tx: mpsc::UnboundedSender<DecoderMessage>,
        generation: u64,
        kind: DecoderKind,
    ) -> Self {
        Self {
            tx,
            generation,
            kind,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn kind(&self) -> DecoderKind {
        self.kind
    }

    /// Returns false once the receiving side is gone.
    pub fn send(&self, event: DecoderEvent) -> bool {
        self.tx
            .send(DecoderMessage {
                generation: self.generation,
                kind: self.kind,
                event,
            })
            .is_ok()
    }
}

/// The media element a decoder renders into
pub trait MediaSink: Send + Sync {
    /// Assign `url` as the element's native source
    fn set_source(&self, url: &str) -> Result<(), DecoderError>;

    /// Whether the element can play `mime` without a decoder
    fn can_play_type(&self, _mime: &str) -> bool {
        false
    }
}

/// A format decoder bound to one source at a time.
///
/// Implementations must release every backend resource in `destroy`, and
/// `destroy` must be idempotent.
#[async_trait]
pub trait StreamDecoder: Send {
    fn kind(&self) -> DecoderKind;

    /// Load `url` into `sink`; events are reported through `events`.
    async fn attach(
        &mut self,
        sink: Arc<dyn MediaSink>,
        url: &str,
        events: DecoderEventSender,
    ) -> Result<(), DecoderError>;

    fn destroy(&mut self);

    fn is_attached(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_adaptive_streaming() {
        assert_eq!(
            classify_url("http://x/stream.m3u8"),
            DecoderKind::AdaptiveStreaming
        );
        assert_eq!(
            classify_url("https://cdn.example.com/live/INDEX.M3U8?token=abc"),
            DecoderKind::AdaptiveStreaming
        );
        // Suffix must terminate the path
        assert_eq!(
            classify_url("http://x/stream.m3u8.bak"),
            DecoderKind::Native
        );
    }

    #[test]
    fn test_classify_flash_video() {
        assert_eq!(classify_url("http://x/live.flv"), DecoderKind::FlashVideo);
        assert_eq!(
            classify_url("http://x/live.FLV?auth=1"),
            DecoderKind::FlashVideo
        );
        assert_eq!(
            classify_url("rtmp://origin.example.com/app/stream"),
            DecoderKind::FlashVideo
        );
    }

    #[test]
    fn test_classify_native() {
        assert_eq!(classify_url("http://x/movie.mp4"), DecoderKind::Native);
        assert_eq!(classify_url(""), DecoderKind::Native);
    }

    #[test]
    fn test_sender_tags_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = DecoderEventSender::new(tx, 7, DecoderKind::FlashVideo);
        assert!(sender.send(DecoderEvent::Ready));

        let message = rx.try_recv().unwrap();
        assert_eq!(message.generation, 7);
        assert_eq!(message.kind, DecoderKind::FlashVideo);
        assert_eq!(message.event, DecoderEvent::Ready);

        drop(rx);
        assert!(!sender.send(DecoderEvent::Destroyed));
    }
}
