//! Error types for decoding and playing synthesized audio.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    /// The payload is not valid standard Base64.
    #[error("Invalid base64 audio payload: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The raw byte buffer does not hold a whole number of 16-bit samples.
    #[error("Malformed PCM16 audio: {len} bytes is not a whole number of samples")]
    MalformedAudio { len: usize },

    /// No output context can be obtained (closed, or no backend available).
    #[error("Audio output unavailable: {0}")]
    PlaybackUnavailable(String),

    /// The output backend reported a failure.
    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Unsupported stream format: {0}")]
    UnsupportedFormat(String),
}
