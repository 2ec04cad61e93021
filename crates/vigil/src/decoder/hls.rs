use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::session::{ActiveSession, BackendSession};
use super::{DecoderError, DecoderEvent, DecoderEventSender, DecoderKind, MediaSink, StreamDecoder};

/// MIME type probed for native HLS playback
pub const HLS_MIME_TYPE: &str = "application/vnd.apple.mpegurl";

/// Options the adaptive-streaming decoder is created with.
///
/// Worker offload and low-latency mode are requested here but implemented by
/// the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HlsOptions {
    pub debug: bool,
    pub enable_worker: bool,
    pub low_latency_mode: bool,
}

impl Default for HlsOptions {
    fn default() -> Self {
        Self {
            debug: false,
            enable_worker: true,
            low_latency_mode: true,
        }
    }
}

/// Native events of an HLS backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HlsEvent {
    ManifestParsed,
    Error { details: String },
}

pub fn translate_hls_event(event: HlsEvent) -> DecoderEvent {
    match event {
        HlsEvent::ManifestParsed => DecoderEvent::Ready,
        HlsEvent::Error { details } => DecoderEvent::DecodeError { detail: details },
    }
}

/// An HLS implementation provided by the host
#[async_trait]
pub trait HlsBackend: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Load the manifest at `url` and attach to `sink`.
    async fn load(
        &self,
        url: &str,
        sink: Arc<dyn MediaSink>,
        options: &HlsOptions,
    ) -> Result<BackendSession<HlsEvent>, DecoderError>;
}

/// Adaptive-streaming adapter over an [`HlsBackend`].
///
/// Falls back to native playback when the backend is unsupported but the
/// sink can play HLS itself.
pub struct AdaptiveStreamingDecoder {
    backend: Arc<dyn HlsBackend>,
    options: HlsOptions,
    session: Option<ActiveSession>,
    events: Option<DecoderEventSender>,
    native_fallback: bool,
}

impl AdaptiveStreamingDecoder {
    pub fn new(backend: Arc<dyn HlsBackend>) -> Self {
        Self::with_options(backend, HlsOptions::default())
    }

    pub fn with_options(backend: Arc<dyn HlsBackend>, options: HlsOptions) -> Self {
        Self {
            backend,
            options,
            session: None,
            events: None,
            native_fallback: false,
        }
    }

    /// Whether the last attach handed the URL to the sink instead
    pub fn is_native_fallback(&self) -> bool {
        self.native_fallback
    }
}

#[async_trait]
impl StreamDecoder for AdaptiveStreamingDecoder {
    fn kind(&self) -> DecoderKind {
        DecoderKind::AdaptiveStreaming
    }

    async fn attach(
        &mut self,
        sink: Arc<dyn MediaSink>,
        url: &str,
        events: DecoderEventSender,
    ) -> Result<(), DecoderError> {
        self.destroy();

        if !self.backend.is_supported() {
            if sink.can_play_type(HLS_MIME_TYPE) {
                info!(url = url, "HLS backend unsupported, using native playback");
                sink.set_source(url)?;
                self.native_fallback = true;
                return Ok(());
            }
            return Err(DecoderError::Unsupported {
                kind: self.kind(),
                url: url.to_owned(),
            });
        }

        let session = self.backend.load(url, sink, &self.options).await?;
        debug!(
            url = url,
            generation = events.generation(),
            low_latency = self.options.low_latency_mode,
            "HLS decoder attached"
        );
        self.session = Some(ActiveSession::spawn(
            session,
            events.clone(),
            translate_hls_event,
        ));
        self.events = Some(events);
        Ok(())
    }

    fn destroy(&mut self) {
        self.native_fallback = false;
        if let Some(session) = self.session.take() {
            drop(session);
            if let Some(events) = self.events.take() {
                events.send(DecoderEvent::Destroyed);
                debug!(generation = events.generation(), "HLS decoder destroyed");
            }
        }
    }

    fn is_attached(&self) -> bool {
        self.session.is_some() || self.native_fallback
    }
}

impl Drop for AdaptiveStreamingDecoder {
    fn drop(&mut self) {
        self.destroy();
    }
}
