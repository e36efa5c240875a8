// Turn assembly from the ordered inbound event stream.

use voicelink::audio::codec::encode_transport_audio;
use voicelink::protocol::{InboundEvent, OUTPUT_SAMPLE_RATE};
use voicelink::turns::{Assembled, HistoryTurn, TurnAssembler};

#[test]
fn deltas_concatenate_and_complete_into_one_turn() {
    let mut assembler = TurnAssembler::new();

    assembler
        .apply(InboundEvent::InputTranscriptionDelta("Hel".into()))
        .unwrap();
    assembler
        .apply(InboundEvent::InputTranscriptionDelta("lo".into()))
        .unwrap();
    assembler
        .apply(InboundEvent::OutputTranscriptionDelta("Hi".into()))
        .unwrap();

    assert_eq!(assembler.live().user, "Hello");
    assert_eq!(assembler.live().model, "Hi");

    let result = assembler.apply(InboundEvent::TurnComplete).unwrap();
    assert_eq!(
        result,
        Assembled::Completed(Some(HistoryTurn {
            user: "Hello".into(),
            model: "Hi".into(),
        }))
    );

    // Live display resets once the turn is archived.
    assert!(assembler.live().is_empty());
}

#[test]
fn empty_turn_is_suppressed() {
    let mut assembler = TurnAssembler::new();
    let result = assembler.apply(InboundEvent::TurnComplete).unwrap();
    assert_eq!(result, Assembled::Completed(None));
}

#[test]
fn one_sided_turn_is_still_archived() {
    let mut assembler = TurnAssembler::new();
    assembler
        .apply(InboundEvent::OutputTranscriptionDelta("Hello there.".into()))
        .unwrap();

    let result = assembler.apply(InboundEvent::TurnComplete).unwrap();
    assert_eq!(
        result,
        Assembled::Completed(Some(HistoryTurn {
            user: String::new(),
            model: "Hello there.".into(),
        }))
    );
}

#[test]
fn fragments_decode_to_service_rate_mono() {
    let mut assembler = TurnAssembler::new();

    // 100 ms of silence as PCM16.
    let pcm = vec![0u8; (OUTPUT_SAMPLE_RATE as usize / 10) * 2];
    let event = InboundEvent::AudioFragment(encode_transport_audio(&pcm));

    match assembler.apply(event).unwrap() {
        Assembled::Audio(buffer) => {
            assert_eq!(buffer.sample_rate, OUTPUT_SAMPLE_RATE);
            assert_eq!(buffer.channels(), 1);
            assert_eq!(buffer.frames(), OUTPUT_SAMPLE_RATE as usize / 10);
        }
        other => panic!("expected audio, got {:?}", other),
    }
}

#[test]
fn malformed_fragment_fails_without_touching_pending_text() {
    let mut assembler = TurnAssembler::new();
    assembler
        .apply(InboundEvent::InputTranscriptionDelta("keep me".into()))
        .unwrap();

    assert!(
        assembler
            .apply(InboundEvent::AudioFragment("not base64 !!!".into()))
            .is_err()
    );
    // An odd byte count is not a whole PCM16 frame either.
    assert!(
        assembler
            .apply(InboundEvent::AudioFragment(encode_transport_audio(&[1, 2, 3])))
            .is_err()
    );

    assert_eq!(assembler.live().user, "keep me");
}

#[test]
fn interruption_passes_through_and_preserves_pending_text() {
    let mut assembler = TurnAssembler::new();
    assembler
        .apply(InboundEvent::OutputTranscriptionDelta("partial".into()))
        .unwrap();

    let result = assembler.apply(InboundEvent::Interrupted).unwrap();
    assert_eq!(result, Assembled::Interrupted);
    assert_eq!(assembler.live().model, "partial");
}

#[test]
fn reset_clears_pending_text() {
    let mut assembler = TurnAssembler::new();
    assembler
        .apply(InboundEvent::InputTranscriptionDelta("stale".into()))
        .unwrap();

    assembler.reset();
    assert!(assembler.live().is_empty());
}
