use serde::{Deserialize, Serialize};

pub const MIN_BPM: u32 = 60;
pub const MAX_BPM: u32 = 200;

/// Therapeutic direction requested for the song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SonicGoal {
    /// Pull the listener into a positive, energetic headspace.
    #[default]
    Uplift,
    /// Keep the current focus and deepen it into a flow state.
    Trance,
    /// Break the current mood with something unexpected.
    Dissonance,
}

impl SonicGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            SonicGoal::Uplift => "uplift",
            SonicGoal::Trance => "trance",
            SonicGoal::Dissonance => "dissonance",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "uplift" => Some(SonicGoal::Uplift),
            "trance" => Some(SonicGoal::Trance),
            "dissonance" => Some(SonicGoal::Dissonance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PsychoAnalysis {
    pub mood_profile: String,
    pub big_five_traits: String,
    pub disc_profile: String,
    pub clinical_reasoning: String,
}

/// A chunk of text tagged for display.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PsychometricSegment {
    pub text: String,
    pub label: String,
    pub color_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PsychometricSegment {
    pub fn new(text: &str, label: &str, color_code: &str) -> Self {
        Self {
            text: text.to_string(),
            label: label.to_string(),
            color_code: color_code.to_string(),
            description: None,
        }
    }
}

/// Structured analysis and song metadata returned by the generation service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongData {
    pub band_name: String,
    pub song_title: String,
    pub lyrics: Vec<String>,
    pub bpm: u32,
    pub description: String,
    pub analysis: PsychoAnalysis,
    #[serde(default)]
    pub transcript_analysis: Vec<PsychometricSegment>,
    #[serde(default)]
    pub musical_analysis: Vec<PsychometricSegment>,
}

impl SongData {
    /// Clamp the tempo into the supported range. Returns `true` if it changed.
    pub fn clamp_bpm(&mut self) -> bool {
        let clamped = self.bpm.clamp(MIN_BPM, MAX_BPM);
        let changed = clamped != self.bpm;
        self.bpm = clamped;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_service_json() {
        let json = r##"{
            "bandName": "The Squeakers",
            "songTitle": "Cheddar Sunrise",
            "lyrics": ["a", "b", "c", "d"],
            "bpm": 128,
            "description": "Bright",
            "analysis": {
                "moodProfile": "Tired",
                "bigFiveTraits": "High openness",
                "discProfile": "S",
                "clinicalReasoning": "Raise arousal"
            },
            "transcriptAnalysis": [{"text": "so tired", "label": "Fatigue", "colorCode": "#118AB2"}]
        }"##;

        let song: SongData = serde_json::from_str(json).unwrap();
        assert_eq!(song.band_name, "The Squeakers");
        assert_eq!(song.analysis.disc_profile, "S");
        assert_eq!(song.transcript_analysis[0].color_code, "#118AB2");
        assert!(song.musical_analysis.is_empty());
    }

    #[test]
    fn goal_round_trips_through_json() {
        let goal: SonicGoal = serde_json::from_str("\"dissonance\"").unwrap();
        assert_eq!(goal, SonicGoal::Dissonance);
        assert_eq!(serde_json::to_string(&SonicGoal::Trance).unwrap(), "\"trance\"");
        assert_eq!(SonicGoal::parse("TRANCE"), Some(SonicGoal::Trance));
        assert_eq!(SonicGoal::parse("calm"), None);
    }
}
