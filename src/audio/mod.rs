//! audio - capture, playback scheduling, and PCM codec helpers
//!
//! ALSA handles device I/O on dedicated threads; the wire format is base64
//! PCM16 (16 kHz out, 24 kHz in) carried as websocket text.

pub mod capture;
pub mod codec;
pub mod device;
pub mod playback;

pub use capture::CapturePipeline;
pub use codec::FloatBuffer;
pub use playback::{AlsaSink, OutputSink, PlaybackScheduler, SourceId};
