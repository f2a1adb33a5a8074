//! Offline demo mode and the canned fallback content.

use std::f32::consts::TAU;
use std::time::Duration;

use async_trait::async_trait;

use super::types::{PsychoAnalysis, PsychometricSegment, SongData, SonicGoal};
use super::{GenerationError, GenerationService};
use crate::audio::pcm;

/// How long the demo "thinks" before answering.
pub const DEMO_ANALYSIS_DELAY: Duration = Duration::from_millis(1500);

/// Each lyric line is sung as one note lasting this many beats.
const BEATS_PER_LINE: f32 = 2.0;
const DEMO_AMPLITUDE: f32 = 0.3;
/// Fade in/out per note, in seconds, to avoid clicks.
const NOTE_FADE: f32 = 0.01;
/// A minor pentatonic, Hz.
const DEMO_SCALE: [f32; 5] = [220.0, 261.63, 293.66, 329.63, 392.0];

pub fn demo_song() -> SongData {
    SongData {
        band_name: "The Placebo Effects".to_string(),
        song_title: "Simulation Theory (Demo)".to_string(),
        lyrics: vec![
            "Analyzing waves in the digital sea".to_string(),
            "Searching for the pulse of reality".to_string(),
            "Data streams flowing through my mind".to_string(),
            "Leaving the analog world behind".to_string(),
        ],
        bpm: 110,
        description: "A synthetic pop track generated without an API key.".to_string(),
        analysis: PsychoAnalysis {
            mood_profile: "Simulated Neutrality".to_string(),
            big_five_traits: "N/A (Demo)".to_string(),
            disc_profile: "N/A (Demo)".to_string(),
            clinical_reasoning: "Demo mode activated.".to_string(),
        },
        transcript_analysis: vec![
            PsychometricSegment::new("I'm feeling a bit", "Hesitation", "#FFD166"),
            PsychometricSegment::new("overwhelmed", "High Neuroticism", "#EF476F"),
            PsychometricSegment::new("with work", "External Stressor", "#118AB2"),
        ],
        musical_analysis: vec![
            PsychometricSegment::new("Analyzing waves", "Cognitive Focus", "#06D6A0"),
            PsychometricSegment::new("Digital sea", "Metaphorical Distance", "#118AB2"),
        ],
    }
}

/// What the UI shows when the analysis request failed.
pub fn error_song() -> SongData {
    SongData {
        band_name: "The Error Rats".to_string(),
        song_title: "Connection Lost Blues".to_string(),
        lyrics: vec![
            "Tried to connect but the wire was cut".to_string(),
            "Now I'm stuck in a digital rut".to_string(),
            "Refresh the page and try again".to_string(),
            "We'll make music, just tell me when!".to_string(),
        ],
        bpm: 80,
        description: "A slow, sad ballad about internet connectivity issues.".to_string(),
        analysis: PsychoAnalysis {
            mood_profile: "Frustrated".to_string(),
            big_five_traits: "Unknown".to_string(),
            disc_profile: "Unknown".to_string(),
            clinical_reasoning: "Service unavailable.".to_string(),
        },
        transcript_analysis: Vec::new(),
        musical_analysis: Vec::new(),
    }
}

/// Render the lyrics as a plain tone melody: one note per line, note length from the tempo.
pub fn demo_melody(song: &SongData, sample_rate: u32) -> Vec<f32> {
    let bpm = song.bpm.max(1) as f32;
    let note_secs = 60.0 / bpm * BEATS_PER_LINE;
    let note_len = (note_secs * sample_rate as f32) as usize;
    let fade_len = ((NOTE_FADE * sample_rate as f32) as usize).clamp(1, note_len.max(2) / 2);

    let mut samples = Vec::with_capacity(note_len * song.lyrics.len());
    for (i, line) in song.lyrics.iter().enumerate() {
        let freq = DEMO_SCALE[(i + line.len()) % DEMO_SCALE.len()];
        for n in 0..note_len {
            let t = n as f32 / sample_rate as f32;
            let edge = n.min(note_len - 1 - n);
            let envelope = (edge as f32 / fade_len as f32).min(1.0);
            samples.push(DEMO_AMPLITUDE * envelope * (TAU * freq * t).sin());
        }
    }
    samples
}

/// Stands in for the live service when no credential is configured.
pub struct DemoService {
    sample_rate: u32,
    delay: Duration,
}

impl DemoService {
    pub fn new(sample_rate: u32, delay: Duration) -> Self {
        Self { sample_rate, delay }
    }
}

#[async_trait]
impl GenerationService for DemoService {
    fn name(&self) -> &str {
        "demo"
    }

    async fn request_analysis(
        &self,
        _session_text: &str,
        _goal: SonicGoal,
    ) -> Result<SongData, GenerationError> {
        tokio::time::sleep(self.delay).await;
        Ok(demo_song())
    }

    async fn request_audio(&self, song: &SongData) -> Result<Option<String>, GenerationError> {
        if song.lyrics.is_empty() {
            return Ok(None);
        }
        let samples = demo_melody(song, self.sample_rate);
        Ok(Some(pcm::encode_base64(&pcm::encode_pcm16(&samples))))
    }
}
