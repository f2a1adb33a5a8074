use serde::{Deserialize, Serialize};

use crate::audio::{ContextState, PlaybackState};
use crate::generation::types::{SongData, SonicGoal};

/// 前端发来的指令
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiCommand {
    Submit {
        text: String,
        #[serde(default)]
        goal: SonicGoal,
    },
    Play,
    Stop,
    Reset,
}

/// 会话所处的阶段，对应前端的页面
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Landing,
    Analyzing,
    Synthesizing,
    Ready,
}

/// 发给前端的状态更新
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiUpdate {
    Phase { phase: SessionPhase },
    Song { song: SongData },
    AudioReady { duration_ms: u64, sample_rate: u32, channels: u16, samples: usize },
    AudioUnavailable,
    Playback { state: PlaybackState },
    Output { state: ContextState },
    Finished,
    Error { message: String },
}

impl UiUpdate {
    pub fn to_json(&self) -> String {
        // 这些类型的序列化不会失败
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"serialize failed: {}"}}"#, e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        let cmd: UiCommand =
            serde_json::from_str(r#"{"type":"submit","text":"meh","goal":"trance"}"#).unwrap();
        assert_eq!(cmd, UiCommand::Submit { text: "meh".into(), goal: SonicGoal::Trance });

        let cmd: UiCommand = serde_json::from_str(r#"{"type":"submit","text":"meh"}"#).unwrap();
        assert_eq!(cmd, UiCommand::Submit { text: "meh".into(), goal: SonicGoal::Uplift });

        let cmd: UiCommand = serde_json::from_str(r#"{"type":"stop"}"#).unwrap();
        assert_eq!(cmd, UiCommand::Stop);

        assert!(serde_json::from_str::<UiCommand>(r#"{"type":"pause"}"#).is_err());
    }

    #[test]
    fn serializes_updates() {
        let json = UiUpdate::Playback { state: PlaybackState::Playing }.to_json();
        assert_eq!(json, r#"{"type":"playback","state":"playing"}"#);

        let json = UiUpdate::Phase { phase: SessionPhase::Synthesizing }.to_json();
        assert_eq!(json, r#"{"type":"phase","phase":"synthesizing"}"#);

        assert_eq!(UiUpdate::AudioUnavailable.to_json(), r#"{"type":"audio_unavailable"}"#);
    }
}
