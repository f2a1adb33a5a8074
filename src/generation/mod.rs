//! The external generation service: psychometric analysis + lyrics, and sung audio.
//!
//! Callers go through [`generate_song`] and [`generate_audio`], which never fail:
//! service errors turn into the error-themed fallback song or "no audio".

pub mod demo;
pub mod gemini;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use types::{SongData, SonicGoal};

pub use demo::DemoService;
pub use gemini::GeminiService;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Service returned no usable content")]
    EmptyResponse,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid endpoint: {0}")]
    Url(#[from] url::ParseError),
}

impl From<serde_json::Error> for GenerationError {
    fn from(e: serde_json::Error) -> Self {
        GenerationError::InvalidPayload(e.to_string())
    }
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    fn name(&self) -> &str;

    async fn request_analysis(
        &self,
        session_text: &str,
        goal: SonicGoal,
    ) -> Result<SongData, GenerationError>;

    /// Base64 PCM16 for the song's lyrics; `Ok(None)` when no audio came back.
    async fn request_audio(&self, song: &SongData) -> Result<Option<String>, GenerationError>;
}

/// Pick the live service when a credential is configured, the offline demo otherwise.
pub fn create_service(config: &Config) -> anyhow::Result<Arc<dyn GenerationService>> {
    match &config.api_key {
        Some(key) => Ok(Arc::new(GeminiService::new(config, key.clone())?)),
        None => {
            log::warn!(
                "No API key in ${}, running in offline demo mode",
                config.gen_api_key_env
            );
            Ok(Arc::new(DemoService::new(
                config.audio_sample_rate,
                demo::DEMO_ANALYSIS_DELAY,
            )))
        }
    }
}

/// Analysis with the service boundary policy applied: any failure yields the fallback song.
pub async fn generate_song(
    service: &dyn GenerationService,
    session_text: &str,
    goal: SonicGoal,
) -> SongData {
    log::info!("Requesting analysis from {} (goal: {})", service.name(), goal.as_str());
    match service.request_analysis(session_text, goal).await {
        Ok(mut song) => {
            if song.clamp_bpm() {
                log::warn!("Service tempo out of range, clamped to {} BPM", song.bpm);
            }
            song
        }
        Err(e) => {
            log::error!("Error generating song metadata: {}", e);
            demo::error_song()
        }
    }
}

/// Audio with the service boundary policy applied: any failure means no audio.
pub async fn generate_audio(service: &dyn GenerationService, song: &SongData) -> Option<String> {
    log::info!("Requesting audio from {} for \"{}\"", service.name(), song.song_title);
    match service.request_audio(song).await {
        Ok(Some(payload)) => Some(payload),
        Ok(None) => {
            log::warn!("Service returned no audio");
            None
        }
        Err(e) => {
            log::error!("Error generating audio: {}", e);
            None
        }
    }
}
