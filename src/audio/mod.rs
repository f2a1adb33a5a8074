//! audio - decoding and playback of synthesized speech
//!
//! The synthesis service hands back Base64-wrapped PCM16 mono at 24kHz.
//! `pcm` turns that into normalized f32 samples, `output` owns the device,
//! and `playback` runs at most one session on it at a time.

#[cfg(feature = "alsa")]
mod alsa_device;
mod error;
pub mod output;
pub mod pcm;
pub mod playback;
pub mod stream_decoder;

pub use error::AudioError;
pub use output::{ContextState, OutputContext};
pub use pcm::SampleBuffer;
pub use playback::{PlaybackController, PlaybackEvent, PlaybackState};
pub use stream_decoder::{StreamDecoder, create_decoder};
