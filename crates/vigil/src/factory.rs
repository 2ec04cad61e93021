use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::decoder::{
    AdaptiveStreamingDecoder, DecoderError, DecoderEventSender, DecoderKind, DecoderMessage,
    FlashVideoDecoder, FlvBackend, FlvOptions, HLS_MIME_TYPE, HlsBackend, HlsOptions, MediaSink,
    StreamDecoder, classify_url,
};

/// Factory selecting and attaching the decoder for a stream URL.
///
/// Backends are optional; a missing backend behaves like an unsupported one.
#[derive(Clone, Default)]
pub struct DecoderFactory {
    hls_backend: Option<Arc<dyn HlsBackend>>,
    flv_backend: Option<Arc<dyn FlvBackend>>,
    hls_options: HlsOptions,
    flv_options: FlvOptions,
}

impl DecoderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hls_backend(mut self, backend: Arc<dyn HlsBackend>) -> Self {
        self.hls_backend = Some(backend);
        self
    }

    pub fn with_flv_backend(mut self, backend: Arc<dyn FlvBackend>) -> Self {
        self.flv_backend = Some(backend);
        self
    }

    pub fn with_hls_options(mut self, options: HlsOptions) -> Self {
        self.hls_options = options;
        self
    }

    pub fn with_flv_options(mut self, options: FlvOptions) -> Self {
        self.flv_options = options;
        self
    }

    /// Detect the decoder kind from a URL
    pub fn detect(url: &str) -> DecoderKind {
        classify_url(url)
    }

    /// Create and attach the decoder for `url`.
    ///
    /// Events of the new instance are tagged with `generation`.
    pub async fn attach(
        &self,
        url: &str,
        sink: Arc<dyn MediaSink>,
        tx: mpsc::UnboundedSender<DecoderMessage>,
        generation: u64,
    ) -> Result<DecoderInstance, DecoderError> {
        let kind = Self::detect(url);
        debug!(url = url, kind = %kind, generation = generation, "Attaching decoder");
        let events = DecoderEventSender::new(tx, generation, kind);

        match kind {
            DecoderKind::AdaptiveStreaming => match &self.hls_backend {
                Some(backend) => {
                    let mut decoder = AdaptiveStreamingDecoder::with_options(
                        backend.clone(),
                        self.hls_options.clone(),
                    );
                    decoder.attach(sink, url, events).await?;
                    Ok(DecoderInstance::AdaptiveStreaming(Box::new(decoder)))
                }
                None if sink.can_play_type(HLS_MIME_TYPE) => {
                    info!(url = url, "No HLS backend, using native playback");
                    sink.set_source(url)?;
                    Ok(DecoderInstance::Native)
                }
                None => Err(DecoderError::Unsupported {
                    kind,
                    url: url.to_owned(),
                }),
            },
            DecoderKind::FlashVideo => {
                let backend = self
                    .flv_backend
                    .clone()
                    .ok_or_else(|| DecoderError::Unsupported {
                        kind,
                        url: url.to_owned(),
                    })?;
                let mut decoder = FlashVideoDecoder::with_options(backend, self.flv_options.clone());
                decoder.attach(sink, url, events).await?;
                Ok(DecoderInstance::FlashVideo(Box::new(decoder)))
            }
            DecoderKind::Native => {
                sink.set_source(url)?;
                Ok(DecoderInstance::Native)
            }
        }
    }
}

/// Enum-based decoder instance owned by the active source
pub enum DecoderInstance {
    AdaptiveStreaming(Box<AdaptiveStreamingDecoder>),
    FlashVideo(Box<FlashVideoDecoder>),
    /// The media element plays the URL itself; nothing to release
    Native,
}

impl DecoderInstance {
    pub fn kind(&self) -> DecoderKind {
        match self {
            Self::AdaptiveStreaming(_) => DecoderKind::AdaptiveStreaming,
            Self::FlashVideo(_) => DecoderKind::FlashVideo,
            Self::Native => DecoderKind::Native,
        }
    }

    /// Release the decoder. Dropping the instance has the same effect.
    pub fn destroy(&mut self) {
        match self {
            Self::AdaptiveStreaming(decoder) => decoder.destroy(),
            Self::FlashVideo(decoder) => decoder.destroy(),
            Self::Native => {}
        }
    }
}

impl std::fmt::Debug for DecoderInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DecoderInstance").field(&self.kind()).finish()
    }
}
