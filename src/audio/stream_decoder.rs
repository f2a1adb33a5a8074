//! Generic stream decoder trait, so the payload format can be switched from config.

use super::error::AudioError;
use super::pcm::{self, SampleBuffer};

/// A trait for decoders that turn an encoded audio payload, as returned by the
/// synthesis service, into normalized samples ready for playback.
pub trait StreamDecoder: Send {
    fn decode(&mut self, payload: &str) -> Result<SampleBuffer, AudioError>;
}

/// Base64-wrapped raw PCM16 little-endian mono.
pub struct Pcm16Decoder {
    sample_rate: u32,
}

impl Pcm16Decoder {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl StreamDecoder for Pcm16Decoder {
    fn decode(&mut self, payload: &str) -> Result<SampleBuffer, AudioError> {
        let bytes = pcm::decode_base64(payload)?;
        pcm::to_sample_buffer(&bytes, self.sample_rate)
    }
}

/// Factory function: create a decoder based on the configured stream format.
pub fn create_decoder(
    stream_format: &str,
    sample_rate: u32,
) -> Result<Box<dyn StreamDecoder>, AudioError> {
    match stream_format {
        "pcm16" | "l16" => Ok(Box::new(Pcm16Decoder::new(sample_rate))),
        other => Err(AudioError::UnsupportedFormat(other.to_string())),
    }
}
