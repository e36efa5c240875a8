// Shared test doubles for the playback and conversation tests.

use std::sync::{Arc, Mutex};

use voicelink::audio::FloatBuffer;
use voicelink::audio::playback::{OutputSink, SourceId};
use voicelink::protocol::OUTPUT_SAMPLE_RATE;

#[derive(Debug, Default)]
pub struct SinkState {
    pub now: f64,
    /// (id, start_at, duration) per begun source, in begin order.
    pub begun: Vec<(SourceId, f64, f64)>,
    pub halts: u32,
}

/// An output sink with a manually advanced clock.
#[derive(Clone, Default)]
pub struct MockSink(pub Arc<Mutex<SinkState>>);

impl MockSink {
    pub fn set_now(&self, t: f64) {
        self.0.lock().unwrap().now = t;
    }

    pub fn begun(&self) -> Vec<(SourceId, f64, f64)> {
        self.0.lock().unwrap().begun.clone()
    }

    pub fn halts(&self) -> u32 {
        self.0.lock().unwrap().halts
    }
}

impl OutputSink for MockSink {
    fn now(&self) -> f64 {
        self.0.lock().unwrap().now
    }

    fn begin(&mut self, id: SourceId, buffer: FloatBuffer, start_at: f64) {
        let mut state = self.0.lock().unwrap();
        state.begun.push((id, start_at, buffer.duration_secs()));
    }

    fn halt_all(&mut self) {
        self.0.lock().unwrap().halts += 1;
    }
}

/// A silent mono fragment of the given duration at the service output rate.
pub fn fragment(duration_secs: f64) -> FloatBuffer {
    let frames = (duration_secs * OUTPUT_SAMPLE_RATE as f64).round() as usize;
    FloatBuffer {
        samples: vec![vec![0.0; frames]],
        sample_rate: OUTPUT_SAMPLE_RATE,
    }
}
