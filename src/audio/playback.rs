//! Playback scheduling for streamed audio fragments.
//!
//! Fragments arrive asynchronously and with varying lengths; the scheduler
//! makes them play gaplessly in arrival order using a single monotonic
//! cursor. An [`Interrupted`](crate::protocol::InboundEvent::Interrupted)
//! barge-in maps to [`PlaybackScheduler::hard_stop`], which discards every
//! queued and playing source and restarts the cursor from "now".
//!
//! The output device sits behind the [`OutputSink`] trait so the scheduling
//! logic is independent of ALSA; the real sink runs a dedicated playback
//! thread (never a tokio task).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use alsa::pcm::PCM;
use tokio::sync::mpsc;

use super::codec::FloatBuffer;
use super::device::{self, NegotiatedParams};

pub type SourceId = u64;

/// A schedulable audio output. `begin` commits one buffer to start at
/// `start_at` on the sink clock; `halt_all` discards everything committed
/// and not yet finished.
pub trait OutputSink: Send {
    /// Seconds on the sink's monotonic clock.
    fn now(&self) -> f64;
    fn begin(&mut self, id: SourceId, buffer: FloatBuffer, start_at: f64);
    fn halt_all(&mut self);
}

/// Owns the playback cursor and the set of in-flight sources. Exactly one
/// scheduler exists per conversation; nothing else mutates its state.
pub struct PlaybackScheduler<S: OutputSink> {
    sink: S,
    next_start: f64,
    next_id: SourceId,
    /// Source id → scheduled end time on the sink clock.
    in_flight: HashMap<SourceId, f64>,
}

impl<S: OutputSink> PlaybackScheduler<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            next_start: 0.0,
            next_id: 0,
            in_flight: HashMap::new(),
        }
    }

    /// Commit one decoded fragment. Starts at the cursor, or at "now" if
    /// the sink has been idle past the cursor; the cursor advances by the
    /// fragment duration, which is the sole ordering mechanism.
    pub fn schedule_fragment(&mut self, buffer: FloatBuffer) -> SourceId {
        let start_at = self.next_start.max(self.sink.now());
        let duration = buffer.duration_secs();

        let id = self.next_id;
        self.next_id += 1;

        self.sink.begin(id, buffer, start_at);
        self.in_flight.insert(id, start_at + duration);
        self.next_start = start_at + duration;
        id
    }

    /// Deregister a source whose playback naturally finished. Keeping the
    /// set accurate is what makes `hard_stop` correct.
    pub fn source_ended(&mut self, id: SourceId) {
        self.in_flight.remove(&id);
    }

    /// Barge-in: stop every in-flight source and restart the cursor from
    /// zero, so the next fragment schedules relative to "now".
    pub fn hard_stop(&mut self) {
        self.sink.halt_all();
        self.in_flight.clear();
        self.next_start = 0.0;
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn cursor(&self) -> f64 {
        self.next_start
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

// ======================== ALSA sink ========================

enum SinkCommand {
    Begin {
        id: SourceId,
        samples: Vec<f32>,
        start_at: f64,
        generation: u64,
    },
}

/// ALSA-backed output sink. Buffers are played by a dedicated thread; a
/// generation counter shared with that thread implements `halt_all`: the
/// bump invalidates every queued command and aborts the buffer currently
/// being written.
pub struct AlsaSink {
    epoch: Instant,
    generation: Arc<AtomicU64>,
    cmd_tx: Option<mpsc::UnboundedSender<SinkCommand>>,
    handle: Option<JoinHandle<()>>,
}

impl AlsaSink {
    /// Open the playback device and start the playback thread. Source-end
    /// notifications are delivered on `ended_tx` so the owner can call
    /// [`PlaybackScheduler::source_ended`].
    pub fn start(
        device_name: &str,
        sample_rate: u32,
        ended_tx: mpsc::UnboundedSender<SourceId>,
    ) -> anyhow::Result<Self> {
        let (pcm, params) = device::open_playback(device_name, sample_rate)?;

        if params.sample_rate % sample_rate != 0 {
            anyhow::bail!(
                "playback device rate {} is not an integer multiple of fragment rate {}",
                params.sample_rate,
                sample_rate
            );
        }

        let epoch = Instant::now();
        let generation = Arc::new(AtomicU64::new(0));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let handle = {
            let generation = generation.clone();
            let upsample = params.sample_rate / sample_rate;
            thread::Builder::new()
                .name("audio-play".into())
                .spawn(move || {
                    play_thread(pcm, &params, upsample, epoch, &generation, cmd_rx, ended_tx);
                })?
        };

        Ok(Self {
            epoch,
            generation,
            cmd_tx: Some(cmd_tx),
            handle: Some(handle),
        })
    }
}

impl OutputSink for AlsaSink {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn begin(&mut self, id: SourceId, buffer: FloatBuffer, start_at: f64) {
        // Inbound fragments are mono; anything else plays channel 0.
        let samples = buffer.samples.into_iter().next().unwrap_or_default();
        let generation = self.generation.load(Ordering::SeqCst);
        if let Some(tx) = &self.cmd_tx {
            let _ = tx.send(SinkCommand::Begin {
                id,
                samples,
                start_at,
                generation,
            });
        }
    }

    fn halt_all(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for AlsaSink {
    fn drop(&mut self) {
        // Invalidate anything queued, then let the thread drain out.
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cmd_tx.take();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn play_thread(
    pcm: PCM,
    params: &NegotiatedParams,
    upsample: u32,
    epoch: Instant,
    generation: &AtomicU64,
    mut cmd_rx: mpsc::UnboundedReceiver<SinkCommand>,
    ended_tx: mpsc::UnboundedSender<SourceId>,
) {
    let io = match pcm.io_f32() {
        Ok(io) => io,
        Err(e) => {
            log::error!("playback device unusable: {}", e);
            return;
        }
    };
    let channels = params.channels as usize;

    log::info!(
        "playback started: rate={}, channels={}, upsample={}",
        params.sample_rate,
        channels,
        upsample,
    );

    while let Some(SinkCommand::Begin {
        id,
        samples,
        start_at,
        generation: enqueued_gen,
    }) = cmd_rx.blocking_recv()
    {
        if generation.load(Ordering::SeqCst) != enqueued_gen {
            // Halted while queued.
            continue;
        }

        if !wait_until(epoch, start_at, generation, enqueued_gen) {
            continue;
        }

        // Expand mono fragment samples to the device's negotiated layout.
        let mut out = Vec::with_capacity(samples.len() * upsample as usize * channels);
        for &sample in &samples {
            for _ in 0..upsample {
                for _ in 0..channels {
                    out.push(sample);
                }
            }
        }

        let mut halted = false;
        for slice in out.chunks(params.period_size * channels) {
            if generation.load(Ordering::SeqCst) != enqueued_gen {
                // Barge-in: discard what the device is still holding.
                let _ = pcm.drop();
                let _ = pcm.prepare();
                halted = true;
                break;
            }
            if let Err(e) = write_frames(&pcm, &io, slice, channels) {
                log::error!("playback write failed: {}", e);
                halted = true;
                break;
            }
        }

        if !halted {
            let _ = ended_tx.send(id);
        }
    }

    log::info!("playback stopped");
}

/// Sleep until `start_at` on the sink clock, polling the generation so a
/// halt cancels the wait. Returns false if halted.
fn wait_until(epoch: Instant, start_at: f64, generation: &AtomicU64, enqueued_gen: u64) -> bool {
    loop {
        if generation.load(Ordering::SeqCst) != enqueued_gen {
            return false;
        }
        let now = epoch.elapsed().as_secs_f64();
        if now >= start_at {
            return true;
        }
        let remaining = start_at - now;
        thread::sleep(Duration::from_secs_f64(remaining.min(0.02)));
    }
}

/// Write one slice of interleaved frames, recovering from XRUNs the same
/// way the capture side does.
fn write_frames(
    pcm: &PCM,
    io: &alsa::pcm::IO<'_, f32>,
    slice: &[f32],
    channels: usize,
) -> anyhow::Result<()> {
    let total_frames = slice.len() / channels;
    let mut written = 0;
    let mut retries = 0u32;

    while written < total_frames {
        match io.writei(&slice[written * channels..]) {
            Ok(n) => {
                written += n;
                retries = 0;
            }
            Err(e) => {
                log::warn!("ALSA playback error: {}, recovering...", e);
                pcm.prepare()?;
                retries += 1;
                if retries >= 3 {
                    anyhow::bail!("dropping {} unwritten frames after repeated XRUN", total_frames - written);
                }
            }
        }
    }
    Ok(())
}
