//! Turn assembly: folds the ordered inbound event stream into a live
//! transcript pair, completed history turns, and playable audio buffers.

use crate::audio::codec::{self, FloatBuffer};
use crate::error::CodecError;
use crate::protocol::{InboundEvent, OUTPUT_SAMPLE_RATE};

/// The current, not-yet-complete exchange. Reset when a turn completes
/// (after archival) and when a session restarts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveTranscript {
    pub user: String,
    pub model: String,
}

impl LiveTranscript {
    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.model.is_empty()
    }
}

/// One completed user/model exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryTurn {
    pub user: String,
    pub model: String,
}

/// What the caller must do with one applied event.
#[derive(Debug, PartialEq)]
pub enum Assembled {
    /// Live transcript changed; republish it.
    Live,
    /// A decoded fragment, ready for the playback scheduler.
    Audio(FloatBuffer),
    /// Turn finished. `Some` carries the turn to archive; `None` means both
    /// sides were empty and nothing is recorded.
    Completed(Option<HistoryTurn>),
    /// Barge-in; forward to the scheduler's hard stop.
    Interrupted,
}

#[derive(Default)]
pub struct TurnAssembler {
    live: LiveTranscript,
}

impl TurnAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self) -> &LiveTranscript {
        &self.live
    }

    /// Discard pending text, e.g. when a session restarts.
    pub fn reset(&mut self) {
        self.live = LiveTranscript::default();
    }

    /// Apply one inbound event in arrival order.
    ///
    /// A `CodecError` means one malformed fragment; the caller logs it and
    /// drops that fragment only — pending text is unaffected.
    pub fn apply(&mut self, event: InboundEvent) -> Result<Assembled, CodecError> {
        match event {
            InboundEvent::InputTranscriptionDelta(text) => {
                self.live.user.push_str(&text);
                Ok(Assembled::Live)
            }
            InboundEvent::OutputTranscriptionDelta(text) => {
                self.live.model.push_str(&text);
                Ok(Assembled::Live)
            }
            InboundEvent::AudioFragment(encoded) => {
                let bytes = codec::decode_transport_audio(&encoded)?;
                let buffer = codec::pcm16_to_float(&bytes, OUTPUT_SAMPLE_RATE, 1)?;
                Ok(Assembled::Audio(buffer))
            }
            InboundEvent::TurnComplete => {
                let turn = if self.live.is_empty() {
                    None
                } else {
                    Some(HistoryTurn {
                        user: std::mem::take(&mut self.live.user),
                        model: std::mem::take(&mut self.live.model),
                    })
                };
                self.live = LiveTranscript::default();
                Ok(Assembled::Completed(turn))
            }
            InboundEvent::Interrupted => Ok(Assembled::Interrupted),
        }
    }
}
