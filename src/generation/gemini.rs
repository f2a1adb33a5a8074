//! HTTP client for the hosted generative model (analysis + text-to-speech).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use super::types::{SongData, SonicGoal};
use super::{GenerationError, GenerationService};
use crate::config::Config;

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

impl GenerateContentResponse {
    fn first_part(&self) -> Option<&Part> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
    }
}

pub struct GeminiService {
    client: Client,
    api_key: String,
    analysis_url: Url,
    tts_url: Url,
    voice: String,
    temperature: f32,
}

impl GeminiService {
    pub fn new(config: &Config, api_key: String) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.gen_timeout_secs))
            .build()?;
        let base = Url::parse(config.gen_api_base)?;

        Ok(Self {
            client,
            api_key,
            analysis_url: endpoint(&base, config.gen_analysis_model)?,
            tts_url: endpoint(&base, config.gen_tts_model)?,
            voice: config.gen_voice.to_string(),
            temperature: config.gen_temperature,
        })
    }

    async fn generate(&self, url: &Url, body: Value) -> Result<GenerateContentResponse, GenerationError> {
        let resp = self
            .client
            .post(url.clone())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json::<GenerateContentResponse>().await?)
    }
}

fn endpoint(base: &Url, model: &str) -> Result<Url, url::ParseError> {
    base.join(&format!("models/{}:generateContent", model))
}

fn goal_instruction(goal: SonicGoal) -> &'static str {
    match goal {
        SonicGoal::Uplift => {
            "The user needs to be pulled out of their current state into a positive, energetic headspace."
        }
        SonicGoal::Trance => {
            "The user wants to stabilize their current focus and enter a flow state. Maintain the vibe but deepen it."
        }
        SonicGoal::Dissonance => {
            "The user needs a 'pattern interrupt'. Break their current mood with something unexpected or jarringly different."
        }
    }
}

fn analysis_prompt(session_text: &str, goal: SonicGoal) -> String {
    format!(
        r#"You are an expert Music Therapist and Psychoanalyst.

Analyze the following user statement/stream of consciousness:
"{text}"

YOUR TASKS:
1. Transcript Analysis: Break the user's speech into segments. For each segment, identify specific Big Five traits, DISC profiles, cognitive biases, or emotional states. Assign a color code to visualize it.
2. Clinical Strategy: The therapeutic goal is {goal}. {instruction}
3. Musical Composition: Create a song (performed by a band of mice) to achieve this goal.
4. Musical Analysis: For the generated lyrics/composition, explain what psychometric effect each part is intended to invoke.

Be scientific yet creative."#,
        text = session_text,
        goal = goal.as_str().to_uppercase(),
        instruction = goal_instruction(goal),
    )
}

fn performance_prompt(song: &SongData) -> String {
    format!(
        "Perform the following lyrics with a {} style.\n\n{}",
        song.description,
        song.lyrics.join("\n")
    )
}

fn segment_schema(description: &str, label_hint: &str) -> Value {
    json!({
        "type": "ARRAY",
        "description": description,
        "items": {
            "type": "OBJECT",
            "properties": {
                "text": { "type": "STRING" },
                "label": { "type": "STRING", "description": label_hint },
                "colorCode": { "type": "STRING", "description": "A hex color, e.g. #EF476F." }
            },
            "required": ["text", "label", "colorCode"]
        }
    })
}

/// Response schema that forces the model to answer with a [`SongData`] document.
fn song_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "bandName": { "type": "STRING", "description": "A punny band name for a band of mice." },
            "songTitle": { "type": "STRING" },
            "lyrics": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "A short 4-line verse or chorus."
            },
            "bpm": { "type": "INTEGER", "description": "Beats per minute, between 60 and 200." },
            "description": { "type": "STRING", "description": "One enthusiastic sentence about the vibe." },
            "analysis": {
                "type": "OBJECT",
                "properties": {
                    "moodProfile": { "type": "STRING" },
                    "bigFiveTraits": { "type": "STRING" },
                    "discProfile": { "type": "STRING" },
                    "clinicalReasoning": { "type": "STRING" }
                },
                "required": ["moodProfile", "bigFiveTraits", "discProfile", "clinicalReasoning"]
            },
            "transcriptAnalysis": segment_schema(
                "The user's input in chunks, each tagged with a psychometric label.",
                "The bias, trait (Big 5/DISC) or emotion detected."
            ),
            "musicalAnalysis": segment_schema(
                "The lyrics in chunks, each tagged with the intended therapeutic effect.",
                "The therapeutic effect being induced."
            )
        },
        "required": [
            "bandName", "songTitle", "lyrics", "bpm", "description",
            "analysis", "transcriptAnalysis", "musicalAnalysis"
        ]
    })
}

fn parse_song(resp: &GenerateContentResponse) -> Result<SongData, GenerationError> {
    let text = resp
        .first_part()
        .and_then(|p| p.text.as_deref())
        .filter(|t| !t.trim().is_empty())
        .ok_or(GenerationError::EmptyResponse)?;

    let song: SongData = serde_json::from_str(text)?;
    if song.lyrics.is_empty() {
        return Err(GenerationError::InvalidPayload("song has no lyrics".to_string()));
    }
    Ok(song)
}

fn extract_audio(resp: &GenerateContentResponse) -> Option<String> {
    resp.first_part()
        .and_then(|p| p.inline_data.as_ref())
        .map(|d| d.data.clone())
        .filter(|d| !d.is_empty())
}

#[async_trait]
impl GenerationService for GeminiService {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn request_analysis(
        &self,
        session_text: &str,
        goal: SonicGoal,
    ) -> Result<SongData, GenerationError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": analysis_prompt(session_text, goal) }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": song_schema(),
                "temperature": self.temperature
            }
        });

        let resp = self.generate(&self.analysis_url, body).await?;
        parse_song(&resp)
    }

    async fn request_audio(&self, song: &SongData) -> Result<Option<String>, GenerationError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": performance_prompt(song) }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": self.voice } }
                }
            }
        });

        let resp = self.generate(&self.tts_url, body).await?;
        Ok(extract_audio(&resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::demo::demo_song;

    fn response(part: Value) -> GenerateContentResponse {
        serde_json::from_value(json!({ "candidates": [{ "content": { "parts": [part] } }] })).unwrap()
    }

    #[test]
    fn endpoint_joins_model_path() {
        let base = Url::parse("https://example.test/v1beta/").unwrap();
        let url = endpoint(&base, "gemini-2.5-flash").unwrap();
        assert_eq!(url.as_str(), "https://example.test/v1beta/models/gemini-2.5-flash:generateContent");
    }

    #[test]
    fn prompt_names_goal_and_text() {
        let prompt = analysis_prompt("I feel stuck", SonicGoal::Dissonance);
        assert!(prompt.contains("\"I feel stuck\""));
        assert!(prompt.contains("DISSONANCE"));
        assert!(prompt.contains("pattern interrupt"));
    }

    #[test]
    fn performance_prompt_lists_lyrics() {
        let song = demo_song();
        let prompt = performance_prompt(&song);
        assert!(prompt.starts_with("Perform the following lyrics with a A synthetic pop track"));
        assert!(prompt.ends_with("Leaving the analog world behind"));
    }

    #[test]
    fn schema_requires_every_song_field() {
        let schema = song_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(required.len(), 8);
        assert!(required.contains(&"musicalAnalysis"));
        assert_eq!(schema["properties"]["bpm"]["type"], "INTEGER");
    }

    #[test]
    fn parses_song_from_text_part() {
        let song_json = serde_json::to_string(&demo_song()).unwrap();
        let resp = response(json!({ "text": song_json }));
        assert_eq!(parse_song(&resp).unwrap(), demo_song());
    }

    #[test]
    fn empty_or_broken_text_is_an_error() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(parse_song(&resp), Err(GenerationError::EmptyResponse)));

        let resp = response(json!({ "text": "{ not json" }));
        assert!(matches!(parse_song(&resp), Err(GenerationError::InvalidPayload(_))));

        let mut song = demo_song();
        song.lyrics.clear();
        let resp = response(json!({ "text": serde_json::to_string(&song).unwrap() }));
        assert!(matches!(parse_song(&resp), Err(GenerationError::InvalidPayload(_))));
    }

    #[test]
    fn extracts_inline_audio() {
        let resp = response(json!({
            "inlineData": { "mimeType": "audio/L16;codec=pcm;rate=24000", "data": "AAD/fw==" }
        }));
        assert_eq!(extract_audio(&resp).as_deref(), Some("AAD/fw=="));

        let resp = response(json!({ "text": "sorry" }));
        assert_eq!(extract_audio(&resp), None);
    }
}
