//! Microphone capture pipeline.
//!
//! Runs on a dedicated OS thread (NOT a tokio task) so ALSA reads never
//! contend with async network work. Each fixed-size window of channel-0
//! float samples is converted to PCM16, transport-encoded, and handed to
//! the session as one [`AudioChunk`]. The handoff never blocks capture: a
//! full queue drops the current window with a warning.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use alsa::pcm::PCM;
use tokio::sync::mpsc;

use super::codec::{encode_transport_audio, float_to_pcm16};
use super::device::{self, NegotiatedParams};
use crate::config::AudioConfig;
use crate::error::CaptureError;
use crate::protocol::AudioChunk;

/// Handle to the capture thread. Dropping it stops capture.
pub struct CapturePipeline {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CapturePipeline {
    /// Acquire the capture device and start streaming windows into
    /// `chunk_tx`.
    ///
    /// Device acquisition happens here, before any thread is spawned, so a
    /// denied or missing microphone is reported before a session is opened.
    pub fn start(
        config: &AudioConfig,
        chunk_tx: mpsc::Sender<AudioChunk>,
    ) -> Result<Self, CaptureError> {
        let (pcm, params) = device::open_capture(&config.capture_device, config.capture_sample_rate)
            .map_err(|e| CaptureError::PermissionDenied(format!("{:#}", e)))?;

        // The wire rate is fixed; hardware that negotiates a higher rate is
        // decimated by an integer ratio.
        if params.sample_rate % config.capture_sample_rate != 0 {
            return Err(CaptureError::Stream(format!(
                "device rate {} is not an integer multiple of capture rate {}",
                params.sample_rate, config.capture_sample_rate
            )));
        }

        let running = Arc::new(AtomicBool::new(true));
        let window = config.capture_window;
        let decimate = (params.sample_rate / config.capture_sample_rate).max(1) as usize;

        let handle = {
            let running = running.clone();
            thread::Builder::new()
                .name("audio-capture".into())
                .spawn(move || {
                    if let Err(e) = capture_thread(pcm, &params, window, decimate, chunk_tx, &running) {
                        log::error!("capture thread error: {}", e);
                    }
                })
                .map_err(|e| CaptureError::Stream(e.to_string()))?
        };

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Signal the thread to stop and wait for it to release the device.
    /// Safe to call more than once.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_thread(
    pcm: PCM,
    params: &NegotiatedParams,
    window: usize,
    decimate: usize,
    chunk_tx: mpsc::Sender<AudioChunk>,
    running: &AtomicBool,
) -> anyhow::Result<()> {
    let channels = params.channels as usize;

    // Interleaved read buffer, one period.
    let mut read_buf = vec![0f32; params.period_size * channels];
    // Channel-0 samples at the wire rate, accumulated into whole windows.
    let mut accum: Vec<f32> = Vec::with_capacity(window * 2);

    let io = pcm.io_f32()?;

    log::info!(
        "capture started: rate={}, channels={}, window={}, decimate={}",
        params.sample_rate,
        channels,
        window,
        decimate,
    );

    while running.load(Ordering::Relaxed) {
        match io.readi(&mut read_buf) {
            Ok(frames) => {
                // Channel 0 only, every `decimate`-th frame.
                for frame in 0..frames {
                    if frame % decimate == 0 {
                        accum.push(read_buf[frame * channels]);
                    }
                }

                while accum.len() >= window {
                    let pcm_bytes = float_to_pcm16(&accum[..window]);
                    let chunk = AudioChunk::new(encode_transport_audio(&pcm_bytes));
                    accum.drain(..window);

                    // Fire-and-forget: never stall capture behind the
                    // transport.
                    match chunk_tx.try_send(chunk) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            log::warn!("outbound audio queue full, dropping capture window");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            log::info!("session gone, stopping capture");
                            return Ok(());
                        }
                    }
                }
            }
            Err(e) => {
                log::warn!("ALSA capture error: {}, recovering...", e);
                if let Err(e2) = pcm.prepare() {
                    log::error!("failed to recover PCM capture: {}", e2);
                    break;
                }
            }
        }
    }

    log::info!("capture stopped");
    Ok(())
}
