//! The output context: one shared audio device handle for the whole process.
//!
//! The context is created once at startup and closed at shutdown. Playback
//! sessions borrow the device through it; at most one session owns it at a
//! time, tracked by `owner`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use super::error::AudioError;
use crate::config::Config;

/// Owner value meaning "no session holds the device".
pub const NO_SESSION: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextState {
    /// Device opened but not yet allowed to produce sound.
    Suspended,
    Running,
    Closed,
}

/// A blocking mono f32 audio sink.
///
/// Implementations are driven from a dedicated render thread, never from the
/// async runtime.
pub trait OutputSink: Send {
    /// Preferred number of frames per `write` call.
    fn period_frames(&self) -> usize;

    /// Write samples, blocking until the device accepted them. Returns the
    /// number of frames written.
    fn write(&mut self, samples: &[f32]) -> Result<usize, AudioError>;

    /// Bring the device back after a failed write (XRUN etc).
    fn recover(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    /// Block until everything queued has been played.
    fn drain(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    /// Throw away everything queued.
    fn discard(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        Ok(())
    }
}

/// Sink without a device. With `realtime` set it sleeps for the duration of
/// every write so sessions last as long as they would on real hardware.
pub struct NullSink {
    sample_rate: u32,
    period_frames: usize,
    realtime: bool,
}

impl NullSink {
    pub fn new(sample_rate: u32, period_frames: usize, realtime: bool) -> Self {
        Self {
            sample_rate,
            period_frames: period_frames.max(1),
            realtime,
        }
    }
}

impl OutputSink for NullSink {
    fn period_frames(&self) -> usize {
        self.period_frames
    }

    fn write(&mut self, samples: &[f32]) -> Result<usize, AudioError> {
        if self.realtime && self.sample_rate > 0 {
            thread::sleep(Duration::from_secs_f64(
                samples.len() as f64 / self.sample_rate as f64,
            ));
        }
        Ok(samples.len())
    }
}

pub struct OutputContext {
    sample_rate: u32,
    sink: Arc<Mutex<Box<dyn OutputSink>>>,
    owner: AtomicU64,
    state: watch::Sender<ContextState>,
}

impl OutputContext {
    pub fn new(sink: Box<dyn OutputSink>, sample_rate: u32, start_suspended: bool) -> Self {
        let initial = if start_suspended {
            ContextState::Suspended
        } else {
            ContextState::Running
        };
        let (state, _) = watch::channel(initial);
        Self {
            sample_rate,
            sink: Arc::new(Mutex::new(sink)),
            owner: AtomicU64::new(NO_SESSION),
            state,
        }
    }

    /// Open the backend named in the configuration.
    pub fn open(config: &Config) -> Result<Self, AudioError> {
        let rate = config.audio_sample_rate;
        let period = config.audio_period_frames;

        let sink: Box<dyn OutputSink> = match config.audio_backend {
            "null" => Box::new(NullSink::new(rate, period, true)),
            #[cfg(feature = "alsa")]
            "alsa" => Box::new(super::alsa_device::AlsaSink::open(
                config.audio_device,
                rate,
                period,
            )?),
            other => {
                return Err(AudioError::PlaybackUnavailable(format!(
                    "backend '{}' is not available in this build",
                    other
                )));
            }
        };

        log::info!(
            "Output context opened: backend={}, device={}, rate={}Hz, period={}",
            config.audio_backend,
            config.audio_device,
            rate,
            period,
        );
        Ok(Self::new(sink, rate, config.audio_start_suspended))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn state(&self) -> ContextState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ContextState> {
        self.state.subscribe()
    }

    /// Make the context audible. Device work runs on the blocking pool.
    pub async fn resume(&self) -> Result<(), AudioError> {
        match self.state() {
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(AudioError::PlaybackUnavailable(
                "output context is closed".to_string(),
            )),
            ContextState::Suspended => {
                self.with_sink_blocking(|sink| sink.resume()).await?;
                // close() may have won the race while we were waiting on the device
                if self.state() == ContextState::Closed {
                    return Err(AudioError::PlaybackUnavailable(
                        "output context is closed".to_string(),
                    ));
                }
                self.state.send_replace(ContextState::Running);
                log::info!("Output context resumed");
                Ok(())
            }
        }
    }

    pub async fn suspend(&self) -> Result<(), AudioError> {
        if self.state() != ContextState::Running {
            return Ok(());
        }
        self.owner.store(NO_SESSION, Ordering::SeqCst);
        self.with_sink_blocking(|sink| {
            sink.discard()?;
            sink.suspend()
        })
        .await?;
        self.state.send_replace(ContextState::Suspended);
        log::info!("Output context suspended");
        Ok(())
    }

    /// Release the device for good. Later resumes fail with `PlaybackUnavailable`.
    pub async fn close(&self) {
        if self.state() == ContextState::Closed {
            return;
        }
        self.state.send_replace(ContextState::Closed);
        self.owner.store(NO_SESSION, Ordering::SeqCst);
        if let Err(e) = self.with_sink_blocking(|sink| sink.discard()).await {
            log::warn!("Failed to flush output on close: {}", e);
        }
        log::info!("Output context closed");
    }

    pub(crate) fn claim(&self, session: u64) {
        self.owner.store(session, Ordering::SeqCst);
    }

    /// Drop ownership if `session` still holds the device.
    pub(crate) fn release(&self, session: u64) {
        let _ = self.owner.compare_exchange(
            session,
            NO_SESSION,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub(crate) fn owner(&self) -> u64 {
        self.owner.load(Ordering::SeqCst)
    }

    pub(crate) fn is_owner(&self, session: u64) -> bool {
        self.owner() == session
    }

    pub(crate) fn lock_sink(&self) -> MutexGuard<'_, Box<dyn OutputSink>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn with_sink_blocking<F>(&self, f: F) -> Result<(), AudioError>
    where
        F: FnOnce(&mut dyn OutputSink) -> Result<(), AudioError> + Send + 'static,
    {
        let sink = Arc::clone(&self.sink);
        tokio::task::spawn_blocking(move || {
            let mut guard = sink.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut **guard)
        })
        .await
        .map_err(|e| AudioError::Device(format!("device task failed: {}", e)))?
    }
}
