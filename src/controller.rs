use crate::audio::{AudioError, PlaybackController, PlaybackEvent, SampleBuffer, StreamDecoder};
use crate::generation::types::{SongData, SonicGoal};
use crate::generation::{self, GenerationService};
use crate::protocol::{SessionPhase, UiCommand, UiUpdate};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Result of a generation task, tagged with the epoch it was started in.
#[derive(Debug)]
pub struct GenerationEvent {
    pub epoch: u64,
    pub kind: GenerationResult,
}

#[derive(Debug)]
pub enum GenerationResult {
    Song(SongData),
    Audio(Option<String>),
}

pub struct SessionController {
    service: Arc<dyn GenerationService>,
    decoder: Box<dyn StreamDecoder>,
    playback: PlaybackController,
    auto_play: bool,
    gen_tx: mpsc::Sender<GenerationEvent>,
    ui_tx: mpsc::Sender<UiUpdate>,
    phase: SessionPhase,
    song: Option<SongData>,
    audio: Option<Arc<SampleBuffer>>,
    // 每次提交或重置都会递增，旧任务的结果据此丢弃
    epoch: u64,
    pending: Option<AbortHandle>,
}

impl SessionController {
    pub fn new(
        service: Arc<dyn GenerationService>,
        decoder: Box<dyn StreamDecoder>,
        playback: PlaybackController,
        auto_play: bool,
        gen_tx: mpsc::Sender<GenerationEvent>,
        ui_tx: mpsc::Sender<UiUpdate>,
    ) -> Self {
        Self {
            service,
            decoder,
            playback,
            auto_play,
            gen_tx,
            ui_tx,
            phase: SessionPhase::Landing,
            song: None,
            audio: None,
            epoch: 0,
            pending: None,
        }
    }

    pub async fn handle_ui_command(&mut self, cmd: UiCommand) {
        match cmd {
            UiCommand::Submit { text, goal } => self.submit(text, goal).await,
            UiCommand::Play => self.play().await,
            UiCommand::Stop => self.playback.stop(),
            UiCommand::Reset => self.reset().await,
        }
    }

    async fn submit(&mut self, text: String, goal: SonicGoal) {
        let text = text.trim().to_string();
        if text.is_empty() {
            self.notify(UiUpdate::Error {
                message: "Tell us how you feel first".to_string(),
            })
            .await;
            return;
        }

        self.clear_session();
        self.set_phase(SessionPhase::Analyzing).await;

        let epoch = self.epoch;
        let service = Arc::clone(&self.service);
        let gen_tx = self.gen_tx.clone();
        log::info!("Session {} submitted (goal: {}, {} chars)", epoch, goal.as_str(), text.len());

        let task = tokio::spawn(async move {
            let song = generation::generate_song(service.as_ref(), &text, goal).await;
            let event = GenerationEvent {
                epoch,
                kind: GenerationResult::Song(song.clone()),
            };
            if gen_tx.send(event).await.is_err() {
                return;
            }

            let audio = generation::generate_audio(service.as_ref(), &song).await;
            let event = GenerationEvent {
                epoch,
                kind: GenerationResult::Audio(audio),
            };
            let _ = gen_tx.send(event).await;
        });
        self.pending = Some(task.abort_handle());
    }

    async fn play(&mut self) {
        let Some(buffer) = self.audio.clone() else {
            log::warn!("Play requested but no audio is loaded");
            return;
        };
        if self.playback.play(buffer).await.is_none() {
            self.notify(UiUpdate::Error {
                message: "Audio output is unavailable".to_string(),
            })
            .await;
        }
    }

    async fn reset(&mut self) {
        log::info!("Session {} reset", self.epoch);
        self.clear_session();
        self.playback.suspend_output().await;
        self.set_phase(SessionPhase::Landing).await;
    }

    /// Stop playback, drop results and cancel any outstanding generation.
    fn clear_session(&mut self) {
        self.epoch += 1;
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        self.playback.stop();
        self.song = None;
        self.audio = None;
    }

    pub async fn handle_generation_event(&mut self, event: GenerationEvent) {
        if event.epoch != self.epoch {
            log::debug!(
                "Dropping result of superseded session {} (current {})",
                event.epoch,
                self.epoch
            );
            return;
        }

        match event.kind {
            GenerationResult::Song(song) => {
                log::info!("Song ready: \"{}\" by {} ({} BPM)", song.song_title, song.band_name, song.bpm);
                self.song = Some(song.clone());
                self.notify(UiUpdate::Song { song }).await;
                self.set_phase(SessionPhase::Synthesizing).await;
            }
            GenerationResult::Audio(payload) => {
                self.pending = None;
                match payload {
                    Some(payload) => self.load_audio(&payload).await,
                    None => self.notify(UiUpdate::AudioUnavailable).await,
                }
                self.set_phase(SessionPhase::Ready).await;
                if self.auto_play && self.audio.is_some() {
                    self.play().await;
                }
            }
        }
    }

    async fn load_audio(&mut self, payload: &str) {
        match self.decode(payload) {
            Ok(buffer) => {
                log::info!(
                    "Audio decoded: {} samples at {}Hz ({:.2}s)",
                    buffer.len(),
                    buffer.sample_rate(),
                    buffer.duration().as_secs_f32()
                );
                self.notify(UiUpdate::AudioReady {
                    duration_ms: buffer.duration().as_millis() as u64,
                    sample_rate: buffer.sample_rate(),
                    channels: buffer.channels(),
                    samples: buffer.len(),
                })
                .await;
                self.audio = Some(Arc::new(buffer));
            }
            Err(e) => {
                log::error!("Failed to decode audio: {}", e);
                self.notify(UiUpdate::Error {
                    message: e.to_string(),
                })
                .await;
            }
        }
    }

    fn decode(&mut self, payload: &str) -> Result<SampleBuffer, AudioError> {
        self.decoder.decode(payload)
    }

    pub fn handle_playback_event(&mut self, event: PlaybackEvent) {
        self.playback.on_session_event(event);
    }

    async fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            self.phase = phase;
            self.notify(UiUpdate::Phase { phase }).await;
        }
    }

    async fn notify(&self, update: UiUpdate) {
        if let Err(e) = self.ui_tx.send(update).await {
            log::error!("Failed to send UI update: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::{NullSink, OutputContext};
    use crate::audio::pcm::SAMPLE_RATE;
    use crate::audio::{PlaybackState, create_decoder};
    use crate::generation::demo::{DemoService, demo_song};
    use crate::generation::GenerationError;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::timeout;

    struct Harness {
        controller: SessionController,
        gen_rx: mpsc::Receiver<GenerationEvent>,
        ui_rx: mpsc::Receiver<UiUpdate>,
        playback_rx: mpsc::Receiver<PlaybackEvent>,
    }

    fn harness(service: Arc<dyn GenerationService>, auto_play: bool) -> Harness {
        let context = Arc::new(OutputContext::new(
            Box::new(NullSink::new(SAMPLE_RATE, 240, true)),
            SAMPLE_RATE,
            true,
        ));
        let (playback_tx, playback_rx) = mpsc::channel(8);
        let (gen_tx, gen_rx) = mpsc::channel(8);
        let (ui_tx, ui_rx) = mpsc::channel(64);
        let controller = SessionController::new(
            service,
            create_decoder("pcm16", SAMPLE_RATE).unwrap(),
            PlaybackController::new(Some(context), playback_tx),
            auto_play,
            gen_tx,
            ui_tx,
        );
        Harness { controller, gen_rx, ui_rx, playback_rx }
    }

    fn demo() -> Arc<dyn GenerationService> {
        Arc::new(DemoService::new(SAMPLE_RATE, Duration::ZERO))
    }

    async fn next_generation(h: &mut Harness) -> GenerationEvent {
        timeout(Duration::from_secs(2), h.gen_rx.recv()).await.unwrap().unwrap()
    }

    fn drain_ui(h: &mut Harness) -> Vec<UiUpdate> {
        let mut updates = Vec::new();
        while let Ok(u) = h.ui_rx.try_recv() {
            updates.push(u);
        }
        updates
    }

    /// Returns a fixed payload so tests can feed odd or broken audio.
    struct FixedAudio(&'static str);

    #[async_trait]
    impl GenerationService for FixedAudio {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn request_analysis(&self, _: &str, _: SonicGoal) -> Result<SongData, GenerationError> {
            Ok(demo_song())
        }

        async fn request_audio(&self, _: &SongData) -> Result<Option<String>, GenerationError> {
            Ok(Some(self.0.to_string()))
        }
    }

    #[tokio::test]
    async fn demo_session_reaches_ready_and_plays() {
        let mut h = harness(demo(), false);
        h.controller
            .handle_ui_command(UiCommand::Submit { text: "overwhelmed with work".into(), goal: SonicGoal::Uplift })
            .await;
        assert_eq!(h.controller.phase, SessionPhase::Analyzing);

        let song = next_generation(&mut h).await;
        h.controller.handle_generation_event(song).await;
        assert_eq!(h.controller.phase, SessionPhase::Synthesizing);
        assert_eq!(h.controller.song.as_ref().unwrap().band_name, "The Placebo Effects");

        let audio = next_generation(&mut h).await;
        h.controller.handle_generation_event(audio).await;
        assert_eq!(h.controller.phase, SessionPhase::Ready);
        assert!(h.controller.audio.is_some());
        assert_eq!(h.controller.playback.state(), PlaybackState::Idle);

        let updates = drain_ui(&mut h);
        assert_eq!(updates[0], UiUpdate::Phase { phase: SessionPhase::Analyzing });
        assert!(matches!(updates[1], UiUpdate::Song { .. }));
        assert!(updates.iter().any(|u| matches!(u, UiUpdate::AudioReady { sample_rate: 24000, .. })));
        assert_eq!(updates.last(), Some(&UiUpdate::Phase { phase: SessionPhase::Ready }));

        h.controller.handle_ui_command(UiCommand::Play).await;
        assert_eq!(h.controller.playback.state(), PlaybackState::Playing);
        h.controller.handle_ui_command(UiCommand::Stop).await;
        assert_eq!(h.controller.playback.state(), PlaybackState::Idle);
        assert!(timeout(Duration::from_millis(300), h.playback_rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn auto_play_starts_after_decode() {
        let mut h = harness(demo(), true);
        h.controller
            .handle_ui_command(UiCommand::Submit { text: "calm me".into(), goal: SonicGoal::Trance })
            .await;
        for _ in 0..2 {
            let event = next_generation(&mut h).await;
            h.controller.handle_generation_event(event).await;
        }
        assert_eq!(h.controller.playback.state(), PlaybackState::Playing);
    }

    /// Answers the analysis at once but takes ages to sing.
    struct SlowAudio;

    #[async_trait]
    impl GenerationService for SlowAudio {
        fn name(&self) -> &str {
            "slow"
        }

        async fn request_analysis(&self, _: &str, _: SonicGoal) -> Result<SongData, GenerationError> {
            Ok(demo_song())
        }

        async fn request_audio(&self, _: &SongData) -> Result<Option<String>, GenerationError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn reset_cancels_and_discards_late_results() {
        let mut h = harness(Arc::new(SlowAudio), false);
        h.controller
            .handle_ui_command(UiCommand::Submit { text: "hello".into(), goal: SonicGoal::Uplift })
            .await;
        let stale = next_generation(&mut h).await;
        let task = h.controller.pending.clone().unwrap();

        h.controller.handle_ui_command(UiCommand::Reset).await;
        assert_eq!(h.controller.phase, SessionPhase::Landing);

        // late result of the old session changes nothing
        h.controller.handle_generation_event(stale).await;
        assert_eq!(h.controller.phase, SessionPhase::Landing);
        assert!(h.controller.song.is_none());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(task.is_finished());
    }

    #[tokio::test]
    async fn resubmit_supersedes_outstanding_request() {
        let mut h = harness(Arc::new(SlowAudio), false);
        h.controller
            .handle_ui_command(UiCommand::Submit { text: "first".into(), goal: SonicGoal::Uplift })
            .await;
        let stale = next_generation(&mut h).await;

        h.controller
            .handle_ui_command(UiCommand::Submit { text: "second".into(), goal: SonicGoal::Dissonance })
            .await;
        h.controller.handle_generation_event(stale).await;
        assert_eq!(h.controller.phase, SessionPhase::Analyzing);

        let fresh = next_generation(&mut h).await;
        assert_eq!(fresh.epoch, 2);
        h.controller.handle_generation_event(fresh).await;
        assert_eq!(h.controller.phase, SessionPhase::Synthesizing);
    }

    #[tokio::test]
    async fn odd_length_audio_reports_error() {
        // "AAD/" decodes to three bytes
        let mut h = harness(Arc::new(FixedAudio("AAD/")), false);
        h.controller
            .handle_ui_command(UiCommand::Submit { text: "hi".into(), goal: SonicGoal::Uplift })
            .await;
        for _ in 0..2 {
            let event = next_generation(&mut h).await;
            h.controller.handle_generation_event(event).await;
        }
        assert_eq!(h.controller.phase, SessionPhase::Ready);
        assert!(h.controller.audio.is_none());
        let updates = drain_ui(&mut h);
        assert!(updates.iter().any(|u| matches!(u, UiUpdate::Error { .. })));

        // play without audio is ignored
        h.controller.handle_ui_command(UiCommand::Play).await;
        assert_eq!(h.controller.playback.state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn empty_submit_is_rejected() {
        let mut h = harness(demo(), false);
        h.controller
            .handle_ui_command(UiCommand::Submit { text: "   ".into(), goal: SonicGoal::Uplift })
            .await;
        assert_eq!(h.controller.phase, SessionPhase::Landing);
        assert!(matches!(drain_ui(&mut h).as_slice(), [UiUpdate::Error { .. }]));
    }

    #[tokio::test]
    async fn natural_completion_returns_to_idle() {
        let mut h = harness(Arc::new(FixedAudio("AAAAAAAAAAA=")), false);
        h.controller
            .handle_ui_command(UiCommand::Submit { text: "hi".into(), goal: SonicGoal::Uplift })
            .await;
        for _ in 0..2 {
            let event = next_generation(&mut h).await;
            h.controller.handle_generation_event(event).await;
        }
        h.controller.handle_ui_command(UiCommand::Play).await;
        let event = timeout(Duration::from_secs(1), h.playback_rx.recv()).await.unwrap().unwrap();
        h.controller.handle_playback_event(event);
        assert_eq!(h.controller.playback.state(), PlaybackState::Idle);
        // audio stays loaded for replay
        assert!(h.controller.audio.is_some());
    }
}
