use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::session::{ActiveSession, BackendSession};
use super::{DecoderError, DecoderEvent, DecoderEventSender, DecoderKind, MediaSink, StreamDecoder};

/// Player options for the flash-video decoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlvOptions {
    pub media_type: String,
    pub has_audio: bool,
    pub has_video: bool,
}

impl Default for FlvOptions {
    fn default() -> Self {
        Self {
            media_type: "flv".to_string(),
            has_audio: true,
            has_video: true,
        }
    }
}

/// Native events of an FLV player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlvEvent {
    LoadingComplete,
    Error {
        error_type: String,
        error_detail: String,
    },
}

/// Only the detail is surfaced; the error type is logged.
pub fn translate_flv_event(event: FlvEvent) -> DecoderEvent {
    match event {
        FlvEvent::LoadingComplete => DecoderEvent::Ready,
        FlvEvent::Error {
            error_type,
            error_detail,
        } => {
            debug!(error_type = %error_type, detail = %error_detail, "FLV player error");
            DecoderEvent::DecodeError {
                detail: error_detail,
            }
        }
    }
}

/// One player instance created by an [`FlvBackend`]
pub trait FlvPlayer: Send {
    fn attach_media_element(&mut self, sink: Arc<dyn MediaSink>) -> Result<(), DecoderError>;

    /// Start loading; returns the player's event stream.
    fn load(&mut self) -> Result<BackendSession<FlvEvent>, DecoderError>;

    fn play(&mut self) -> Result<(), DecoderError>;

    fn destroy(&mut self);
}

/// An FLV implementation provided by the host
#[async_trait]
pub trait FlvBackend: Send + Sync {
    fn is_supported(&self) -> bool;

    async fn create_player(
        &self,
        url: &str,
        options: &FlvOptions,
    ) -> Result<Box<dyn FlvPlayer>, DecoderError>;
}

/// Flash-video adapter: creates a player, attaches it to the sink, loads
/// and starts it.
pub struct FlashVideoDecoder {
    backend: Arc<dyn FlvBackend>,
    options: FlvOptions,
    player: Option<Box<dyn FlvPlayer>>,
    session: Option<ActiveSession>,
    events: Option<DecoderEventSender>,
}

impl FlashVideoDecoder {
    pub fn new(backend: Arc<dyn FlvBackend>) -> Self {
        Self::with_options(backend, FlvOptions::default())
    }

    pub fn with_options(backend: Arc<dyn FlvBackend>, options: FlvOptions) -> Self {
        Self {
            backend,
            options,
            player: None,
            session: None,
            events: None,
        }
    }
}

#[async_trait]
impl StreamDecoder for FlashVideoDecoder {
    fn kind(&self) -> DecoderKind {
        DecoderKind::FlashVideo
    }

    async fn attach(
        &mut self,
        sink: Arc<dyn MediaSink>,
        url: &str,
        events: DecoderEventSender,
    ) -> Result<(), DecoderError> {
        self.destroy();

        if !self.backend.is_supported() {
            return Err(DecoderError::Unsupported {
                kind: self.kind(),
                url: url.to_owned(),
            });
        }

        let mut player = self.backend.create_player(url, &self.options).await?;

        // A half-started player must not outlive a failed attach
        let started = player
            .attach_media_element(sink)
            .and_then(|()| player.load())
            .and_then(|session| player.play().map(|()| session));
        let session = match started {
            Ok(session) => session,
            Err(e) => {
                warn!(url = url, error = %e, "FLV player failed to start");
                player.destroy();
                return Err(e);
            }
        };

        debug!(url = url, generation = events.generation(), "FLV decoder attached");
        self.session = Some(ActiveSession::spawn(
            session,
            events.clone(),
            translate_flv_event,
        ));
        self.player = Some(player);
        self.events = Some(events);
        Ok(())
    }

    fn destroy(&mut self) {
        self.session.take();
        if let Some(mut player) = self.player.take() {
            player.destroy();
            if let Some(events) = self.events.take() {
                events.send(DecoderEvent::Destroyed);
                debug!(generation = events.generation(), "FLV decoder destroyed");
            }
        }
    }

    fn is_attached(&self) -> bool {
        self.player.is_some()
    }
}

impl Drop for FlashVideoDecoder {
    fn drop(&mut self) {
        self.destroy();
    }
}
