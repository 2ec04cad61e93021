use super::DecoderKind;

#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("{kind} playback is not supported for {url}")]
    Unsupported { kind: DecoderKind, url: String },

    #[error("Failed to attach {kind} decoder: {reason}")]
    Attach { kind: DecoderKind, reason: String },

    #[error("Decoder backend error: {0}")]
    Backend(String),
}
