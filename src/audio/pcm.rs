//! Base64 → PCM16 → normalized f32 sample conversion.
//!
//! The synthesis service returns raw 16-bit little-endian mono PCM wrapped in
//! standard Base64. Samples are normalized by dividing by 32768, so -32768
//! maps to exactly -1.0 and 32767 stays just below +1.0.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose;

use super::error::AudioError;

/// Sample rate of synthesized speech and of the output context.
pub const SAMPLE_RATE: u32 = 24000;

/// Synthesized audio is always mono.
pub const CHANNELS: u16 = 1;

const PCM16_SCALE: f32 = 32768.0;

/// Normalized mono samples ready for playback.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Metadata only; no resampling is ever performed.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        CHANNELS
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Decode standard (padded) Base64 text into raw bytes.
///
/// ASCII whitespace is ignored, as line-wrapped payloads are common. Any other
/// character outside the alphabet, or a padding/length violation, is an error.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, AudioError> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    Ok(general_purpose::STANDARD.decode(compact)?)
}

/// Reinterpret raw bytes as PCM16 LE samples and normalize each by 1/32768.
///
/// Odd-length input is rejected with [`AudioError::MalformedAudio`] instead of
/// silently dropping the trailing byte.
pub fn to_sample_buffer(bytes: &[u8], sample_rate: u32) -> Result<SampleBuffer, AudioError> {
    if bytes.len() % 2 != 0 {
        return Err(AudioError::MalformedAudio { len: bytes.len() });
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM16_SCALE)
        .collect();

    Ok(SampleBuffer::new(samples, sample_rate))
}

/// Inverse of [`to_sample_buffer`]: clamp to [-1, 1], scale by 32768 and
/// saturate at the i16 range.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let scaled = (sample.clamp(-1.0, 1.0) * PCM16_SCALE).round();
        let value = scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub fn encode_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_values_normalize_asymmetrically() {
        let buffer = to_sample_buffer(&[0xFF, 0xFF, 0x00, 0x80, 0xFF, 0x7F], SAMPLE_RATE).unwrap();
        let s = buffer.samples();
        assert_eq!(s[0], -1.0 / 32768.0);
        assert_eq!(s[1], -1.0);
        assert_eq!(s[2], 32767.0 / 32768.0);
        assert!(s[2] < 1.0);
    }

    #[test]
    fn end_to_end_payload() {
        let payload = encode_base64(&[0x00, 0x00, 0xFF, 0x7F]);
        let bytes = decode_base64(&payload).unwrap();
        assert_eq!(bytes, vec![0x00, 0x00, 0xFF, 0x7F]);

        let buffer = to_sample_buffer(&bytes, SAMPLE_RATE).unwrap();
        assert_eq!(buffer.samples(), &[0.0, 32767.0 / 32768.0]);
        assert_eq!(buffer.sample_rate(), 24000);
        assert_eq!(buffer.channels(), 1);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let err = decode_base64("not-valid-base64!!").unwrap_err();
        assert!(matches!(err, AudioError::Decode(_)));
    }

    #[test]
    fn bad_padding_is_rejected() {
        assert!(matches!(decode_base64("AAA"), Err(AudioError::Decode(_))));
        assert!(matches!(decode_base64("AA=A"), Err(AudioError::Decode(_))));
    }

    #[test]
    fn wrapped_payload_decodes() {
        assert_eq!(decode_base64("AAD/\nfw==\r\n").unwrap(), vec![0x00, 0x00, 0xFF, 0x7F]);
    }

    #[test]
    fn odd_length_is_malformed() {
        let err = to_sample_buffer(&[0x00, 0x00, 0x01], SAMPLE_RATE).unwrap_err();
        assert!(matches!(err, AudioError::MalformedAudio { len: 3 }));
    }

    #[test]
    fn empty_payload_gives_empty_buffer() {
        let buffer = to_sample_buffer(&decode_base64("").unwrap(), SAMPLE_RATE).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.duration(), Duration::ZERO);
    }

    #[test]
    fn every_i16_lands_in_range_and_keeps_order() {
        let bytes: Vec<u8> = (i16::MIN..=i16::MAX).flat_map(|v| v.to_le_bytes()).collect();
        let buffer = to_sample_buffer(&bytes, SAMPLE_RATE).unwrap();

        assert_eq!(buffer.len(), bytes.len() / 2);
        assert!(buffer.samples().iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!(buffer.samples().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn float_round_trip_within_one_step() {
        let original = [0.0f32, 0.25, -0.5, 0.999, -1.0, 0.123_456];
        let buffer = to_sample_buffer(&encode_pcm16(&original), SAMPLE_RATE).unwrap();
        for (a, b) in original.iter().zip(buffer.samples()) {
            assert!((a - b).abs() <= 1.0 / 32768.0, "{a} vs {b}");
        }
    }

    #[test]
    fn encoder_saturates_full_scale() {
        assert_eq!(encode_pcm16(&[1.0, -1.0, 3.0]), vec![0xFF, 0x7F, 0x00, 0x80, 0xFF, 0x7F]);
    }

    #[test]
    fn duration_follows_sample_rate() {
        let buffer = SampleBuffer::new(vec![0.0; 12000], SAMPLE_RATE);
        assert_eq!(buffer.duration(), Duration::from_millis(500));
    }
}
