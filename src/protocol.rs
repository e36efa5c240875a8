//! Wire message shapes for the live session channel.
//!
//! The session speaks JSON text frames in both directions. Outbound audio is
//! base64 PCM tagged with its MIME label; inbound fragments are base64 PCM
//! at [`OUTPUT_SAMPLE_RATE`] mono per the service's documented format.

use serde::{Deserialize, Serialize};

/// Fixed capture rate; the outbound MIME label is derived from it.
pub const INPUT_SAMPLE_RATE: u32 = 16_000;
/// Inbound fragments are always this rate, mono. Contract constant, not
/// negotiated.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;
/// MIME label attached to every outbound capture window.
pub const INPUT_MIME: &str = "audio/pcm;rate=16000";

/// One encoded capture window, ready for transmission. Ownership moves to
/// the session transport; it is not retained after send.
#[derive(Debug, Clone, Serialize)]
pub struct AudioChunk {
    pub format: String,
    pub data: String,
}

impl AudioChunk {
    pub fn new(data: String) -> Self {
        Self {
            format: INPUT_MIME.to_string(),
            data,
        }
    }
}

/// Initial message sent after the websocket opens.
#[derive(Serialize)]
pub struct HelloMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub version: u8,
    pub transport: String,
    pub audio_params: AudioParams,
}

#[derive(Serialize)]
pub struct AudioParams {
    pub format: String,
    pub sample_rate: u32,
    pub channels: u8,
}

impl HelloMessage {
    pub fn new() -> Self {
        Self {
            msg_type: "hello".to_string(),
            version: 1,
            transport: "websocket".to_string(),
            audio_params: AudioParams {
                format: INPUT_MIME.to_string(),
                sample_rate: INPUT_SAMPLE_RATE,
                channels: 1,
            },
        }
    }
}

/// Outbound envelope for one audio chunk.
#[derive(Serialize)]
pub struct OutboundAudioMessage<'a> {
    #[serde(rename = "type")]
    pub msg_type: &'a str,
    pub format: &'a str,
    pub data: &'a str,
}

/// Raw inbound server message; `msg_type` selects which fields matter.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub text: Option<String>,
    pub state: Option<String>,
    pub data: Option<String>,
    pub session_id: Option<String>,
}

/// One tagged inbound event. Events for a turn arrive in order; deltas for
/// the same turn concatenate in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    InputTranscriptionDelta(String),
    OutputTranscriptionDelta(String),
    /// Transport-encoded PCM, [`OUTPUT_SAMPLE_RATE`] mono.
    AudioFragment(String),
    TurnComplete,
    Interrupted,
}

impl ServerMessage {
    /// Map a raw server message onto an event, or None for types this
    /// client does not consume (hello acks, keepalives).
    pub fn into_event(self) -> Option<InboundEvent> {
        match self.msg_type.as_str() {
            "stt" => self.text.map(InboundEvent::InputTranscriptionDelta),
            "tts" => self.text.map(InboundEvent::OutputTranscriptionDelta),
            "audio" => self.data.map(InboundEvent::AudioFragment),
            "turn" => match self.state.as_deref() {
                Some("complete") => Some(InboundEvent::TurnComplete),
                Some("interrupted") => Some(InboundEvent::Interrupted),
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Option<InboundEvent> {
        serde_json::from_str::<ServerMessage>(raw)
            .ok()
            .and_then(ServerMessage::into_event)
    }

    #[test]
    fn maps_transcription_deltas() {
        assert_eq!(
            parse(r#"{"type":"stt","text":"Hel"}"#),
            Some(InboundEvent::InputTranscriptionDelta("Hel".into()))
        );
        assert_eq!(
            parse(r#"{"type":"tts","text":"Hi"}"#),
            Some(InboundEvent::OutputTranscriptionDelta("Hi".into()))
        );
    }

    #[test]
    fn maps_turn_markers() {
        assert_eq!(
            parse(r#"{"type":"turn","state":"complete","session_id":"s1"}"#),
            Some(InboundEvent::TurnComplete)
        );
        assert_eq!(
            parse(r#"{"type":"turn","state":"interrupted"}"#),
            Some(InboundEvent::Interrupted)
        );
    }

    #[test]
    fn maps_audio_fragments() {
        assert_eq!(
            parse(r#"{"type":"audio","data":"AAAA"}"#),
            Some(InboundEvent::AudioFragment("AAAA".into()))
        );
    }

    #[test]
    fn ignores_unknown_types() {
        assert_eq!(parse(r#"{"type":"hello"}"#), None);
        assert_eq!(parse(r#"{"type":"turn","state":"started"}"#), None);
    }

    #[test]
    fn hello_carries_capture_params() {
        let hello = HelloMessage::new();
        let json = serde_json::to_string(&hello).unwrap();
        assert!(json.contains(r#""sample_rate":16000"#));
        assert!(json.contains(r#""audio/pcm;rate=16000"#));
    }
}
