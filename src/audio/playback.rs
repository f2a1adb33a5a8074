//! Playback controller: at most one active session on the shared output context.
//!
//! Each session renders its buffer on its own OS thread. A session only writes
//! while it owns the output context; `stop()` and a superseding `play()` take
//! ownership away, so a torn-down session can neither keep sounding nor report
//! completion for a newer one.

use std::sync::Arc;
use std::thread;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};

use super::output::{NO_SESSION, OutputContext};
use super::pcm::SampleBuffer;

/// 连续写入失败的最大重试次数
const MAX_RECOVERY_RETRIES: u32 = 3;

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Playing,
}

/// Reported by a render thread back to the controller's owner loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// The whole buffer was played.
    Finished(SessionId),
    /// The device gave up mid-buffer.
    Failed(SessionId),
}

struct Session {
    id: SessionId,
    buffer: Arc<SampleBuffer>,
}

pub struct PlaybackController {
    context: Option<Arc<OutputContext>>,
    events: mpsc::Sender<PlaybackEvent>,
    state: watch::Sender<PlaybackState>,
    completions: broadcast::Sender<SessionId>,
    last_session: SessionId,
    session: Option<Session>,
}

impl PlaybackController {
    /// `events` must be drained by the owner and fed back through
    /// [`PlaybackController::on_session_event`].
    pub fn new(context: Option<Arc<OutputContext>>, events: mpsc::Sender<PlaybackEvent>) -> Self {
        let (state, _) = watch::channel(PlaybackState::Idle);
        let (completions, _) = broadcast::channel(16);
        Self {
            context,
            events,
            state,
            completions,
            last_session: NO_SESSION,
            session: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state.subscribe()
    }

    /// Fires once per session that reached the end of its buffer on its own.
    pub fn subscribe_completions(&self) -> broadcast::Receiver<SessionId> {
        self.completions.subscribe()
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Start playing `buffer`, replacing whatever is playing now.
    ///
    /// Without a usable output context this logs and returns `None`.
    pub async fn play(&mut self, buffer: Arc<SampleBuffer>) -> Option<SessionId> {
        let Some(context) = self.context.clone() else {
            log::warn!("No output context available, ignoring play request");
            return None;
        };

        if let Err(e) = context.resume().await {
            log::warn!("Cannot start playback: {}", e);
            return None;
        }

        if self.session.is_some() {
            log::info!("Interrupting current session for new playback");
            self.stop();
        }

        if buffer.sample_rate() != context.sample_rate() {
            log::warn!(
                "Buffer is {}Hz but output runs at {}Hz, playing without resampling",
                buffer.sample_rate(),
                context.sample_rate()
            );
        }

        self.last_session += 1;
        let id = self.last_session;
        context.claim(id);

        let spawned = {
            let context = Arc::clone(&context);
            let buffer = Arc::clone(&buffer);
            let events = self.events.clone();
            thread::Builder::new()
                .name(format!("audio-play-{}", id))
                .spawn(move || render_session(id, &buffer, &context, &events))
        };
        if let Err(e) = spawned {
            log::error!("Failed to spawn playback thread: {}", e);
            context.release(id);
            return None;
        }

        log::info!(
            "Playback session {} started: {} samples ({:.2}s)",
            id,
            buffer.len(),
            buffer.duration().as_secs_f32()
        );
        self.session = Some(Session { id, buffer });
        self.state.send_replace(PlaybackState::Playing);
        Some(id)
    }

    /// Halt the active session, if any. Safe to call at any time.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if let Some(context) = &self.context {
            context.release(session.id);
        }
        log::info!("Playback session {} stopped", session.id);
        self.state.send_replace(PlaybackState::Idle);
    }

    /// Stop and let the device go quiet until the next `play` resumes it.
    pub async fn suspend_output(&mut self) {
        self.stop();
        if let Some(context) = &self.context {
            if let Err(e) = context.suspend().await {
                log::warn!("Failed to suspend output: {}", e);
            }
        }
    }

    /// Apply a render thread report. Returns `true` when it completed the
    /// active session; reports from torn-down sessions are ignored.
    pub fn on_session_event(&mut self, event: PlaybackEvent) -> bool {
        let (id, finished) = match event {
            PlaybackEvent::Finished(id) => (id, true),
            PlaybackEvent::Failed(id) => (id, false),
        };

        if self.current_session() != Some(id) {
            log::debug!("Ignoring stale report from session {}", id);
            return false;
        }

        self.session = None;
        if let Some(context) = &self.context {
            context.release(id);
        }
        self.state.send_replace(PlaybackState::Idle);

        if finished {
            log::info!("Playback session {} finished", id);
            // no subscribers is fine
            let _ = self.completions.send(id);
        } else {
            log::warn!("Playback session {} aborted by device errors", id);
        }
        finished
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Render loop of one session. Runs on its own OS thread.
fn render_session(
    id: SessionId,
    buffer: &SampleBuffer,
    context: &OutputContext,
    events: &mpsc::Sender<PlaybackEvent>,
) {
    let samples = buffer.samples();
    let mut frames_written = 0;
    let mut retry_count = 0u32;
    let mut first_write = true;

    while frames_written < samples.len() {
        let mut sink = context.lock_sink();

        if !context.is_owner(id) {
            // 没有新会话接管时，丢弃设备里残留的数据
            if context.owner() == NO_SESSION {
                if let Err(e) = sink.discard() {
                    log::warn!("Failed to flush output after stop: {}", e);
                }
            }
            log::debug!(
                "Session {} torn down after {}/{} frames",
                id,
                frames_written,
                samples.len()
            );
            return;
        }

        if first_write {
            // leftovers of a superseded session must not play before ours
            if let Err(e) = sink.discard() {
                log::warn!("Failed to flush previous session: {}", e);
            }
            first_write = false;
        }

        let end = (frames_written + sink.period_frames()).min(samples.len());
        match sink.write(&samples[frames_written..end]) {
            Ok(n) if n > 0 => {
                frames_written += n;
                retry_count = 0;
            }
            result => {
                if let Err(e) = result {
                    log::warn!("Audio output error: {}, recovering...", e);
                }
                retry_count += 1;

                if let Err(e) = sink.recover() {
                    log::error!("Failed to recover audio output: {}", e);
                    report(id, context, events, PlaybackEvent::Failed(id));
                    return;
                }

                // 熔断器：设备持续写入失败时放弃本次播放，防止死循环
                if retry_count >= MAX_RECOVERY_RETRIES {
                    log::error!(
                        "Max recovery retries ({}) reached. Dropping {} unwritten frames.",
                        retry_count,
                        samples.len() - frames_written
                    );
                    report(id, context, events, PlaybackEvent::Failed(id));
                    return;
                }
            }
        }
    }

    {
        let mut sink = context.lock_sink();
        if context.is_owner(id) {
            if let Err(e) = sink.drain() {
                log::warn!("Failed to drain audio output: {}", e);
            }
        }
    }

    report(id, context, events, PlaybackEvent::Finished(id));
}

fn report(
    id: SessionId,
    context: &OutputContext,
    events: &mpsc::Sender<PlaybackEvent>,
    event: PlaybackEvent,
) {
    if !context.is_owner(id) {
        log::debug!("Session {} lost the output before reporting {:?}", id, event);
        return;
    }
    if events.blocking_send(event).is_err() {
        log::warn!("Playback event receiver dropped");
    }
}
