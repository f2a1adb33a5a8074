//! ALSA PCM playback sink.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};

use super::error::AudioError;
use super::output::OutputSink;

/// Parameters negotiated with the ALSA hardware.
#[derive(Debug, Clone)]
pub struct AlsaParams {
    /// Actual sample rate after negotiation
    pub sample_rate: u32,
    /// Actual number of channels
    pub channels: u32,
    /// Period size in frames (one frame = channels × sample_width)
    pub period_size: usize,
}

pub struct AlsaSink {
    pcm: PCM,
    params: AlsaParams,
    /// Interleaved scratch buffer when the device insists on more than one channel.
    interleaved: Vec<f32>,
}

impl AlsaSink {
    /// Open a PCM device for mono f32 playback.
    pub fn open(device: &str, sample_rate: u32, period_size: usize) -> Result<Self, AudioError> {
        let (pcm, params) = open_playback(device, sample_rate, period_size).map_err(|e| {
            AudioError::PlaybackUnavailable(format!("failed to open PCM device '{}': {}", device, e))
        })?;

        if params.sample_rate != sample_rate {
            log::warn!(
                "ALSA negotiated {}Hz instead of {}Hz, playback pitch will be off",
                params.sample_rate,
                sample_rate
            );
        }

        Ok(Self {
            pcm,
            params,
            interleaved: Vec::new(),
        })
    }
}

fn open_playback(
    device: &str,
    sample_rate: u32,
    period_size: usize,
) -> alsa::Result<(PCM, AlsaParams)> {
    let pcm = PCM::new(device, Direction::Playback, false)?;

    // Configure hardware parameters
    {
        let hwp = HwParams::any(&pcm)?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::FloatLE)?;
        hwp.set_channels_near(1)?;
        hwp.set_rate_near(sample_rate, ValueOr::Nearest)?;
        if period_size > 0 {
            hwp.set_period_size_near(period_size as alsa::pcm::Frames, ValueOr::Nearest)?;
        }
        pcm.hw_params(&hwp)?;
    }

    // Read back actual negotiated parameters
    let params = {
        let hwp = pcm.hw_params_current()?;
        AlsaParams {
            sample_rate: hwp.get_rate()?,
            channels: hwp.get_channels()?,
            period_size: hwp.get_period_size()? as usize,
        }
    };

    log::info!(
        "ALSA Playback: device={}, rate={}, channels={}, period_size={}",
        device,
        params.sample_rate,
        params.channels,
        params.period_size,
    );

    Ok((pcm, params))
}

fn device_error(e: alsa::Error) -> AudioError {
    AudioError::Device(e.to_string())
}

impl OutputSink for AlsaSink {
    fn period_frames(&self) -> usize {
        self.params.period_size.max(1)
    }

    fn write(&mut self, samples: &[f32]) -> Result<usize, AudioError> {
        let io = self.pcm.io_f32().map_err(device_error)?;
        let channels = self.params.channels as usize;
        if channels <= 1 {
            return io.writei(samples).map_err(device_error);
        }

        // 单声道复制到所有声道
        self.interleaved.clear();
        for &s in samples {
            self.interleaved.extend(std::iter::repeat_n(s, channels));
        }
        io.writei(&self.interleaved).map_err(device_error)
    }

    fn recover(&mut self) -> Result<(), AudioError> {
        // 触发 ALSA 硬件恢复状态机
        self.pcm.prepare().map_err(device_error)
    }

    fn drain(&mut self) -> Result<(), AudioError> {
        self.pcm.drain().map_err(device_error)?;
        self.pcm.prepare().map_err(device_error)
    }

    fn discard(&mut self) -> Result<(), AudioError> {
        self.pcm.drop().map_err(device_error)?;
        self.pcm.prepare().map_err(device_error)
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.pcm.prepare().map_err(device_error)
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        self.pcm.drop().map_err(device_error)
    }
}
