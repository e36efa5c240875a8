//! ALSA PCM device setup for float capture and playback.

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction, ValueOr};
use anyhow::{Context, Result};

/// Parameters actually negotiated with the hardware. The requested rate is
/// matched as closely as the device allows; callers must use these values,
/// not the requested ones.
#[derive(Debug, Clone)]
pub struct NegotiatedParams {
    pub sample_rate: u32,
    pub channels: u32,
    /// Period size in frames.
    pub period_size: usize,
}

/// Open a PCM device for float capture at (near) the given rate.
pub fn open_capture(device: &str, sample_rate: u32) -> Result<(PCM, NegotiatedParams)> {
    open_pcm(device, Direction::Capture, sample_rate, 1, "capture")
}

/// Open a PCM device for mono float playback at (near) the given rate.
pub fn open_playback(device: &str, sample_rate: u32) -> Result<(PCM, NegotiatedParams)> {
    open_pcm(device, Direction::Playback, sample_rate, 1, "playback")
}

fn open_pcm(
    device: &str,
    direction: Direction,
    sample_rate: u32,
    channels: u32,
    dir_name: &str,
) -> Result<(PCM, NegotiatedParams)> {
    let pcm = PCM::new(device, direction, false)
        .with_context(|| format!("failed to open PCM device '{}' for {}", device, dir_name))?;

    {
        let hwp = HwParams::any(&pcm).context("failed to initialize HwParams")?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::FloatLE)?;
        // Mono is requested; some hardware insists on more channels, in
        // which case capture uses channel 0 and playback duplicates.
        hwp.set_channels_near(channels)?;
        hwp.set_rate_near(sample_rate, ValueOr::Nearest)?;
        pcm.hw_params(&hwp)?;
    }

    let (actual_rate, actual_channels, period_size) = {
        let hwp = pcm.hw_params_current()?;
        (hwp.get_rate()?, hwp.get_channels()?, hwp.get_period_size()? as usize)
    };

    let params = NegotiatedParams {
        sample_rate: actual_rate,
        channels: actual_channels,
        period_size,
    };

    log::info!(
        "ALSA {}: device={}, rate={}, channels={}, period_size={}",
        dir_name,
        device,
        actual_rate,
        actual_channels,
        period_size,
    );

    Ok((pcm, params))
}
