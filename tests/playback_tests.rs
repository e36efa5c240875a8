// Scheduling and interruption behavior of the playback cursor.

mod common;

use common::{MockSink, fragment};
use voicelink::audio::playback::PlaybackScheduler;

#[test]
fn fragments_play_back_to_back_in_arrival_order() {
    let sink = MockSink::default();
    let mut scheduler = PlaybackScheduler::new(sink.clone());

    scheduler.schedule_fragment(fragment(0.5));
    scheduler.schedule_fragment(fragment(0.3));

    let begun = sink.begun();
    assert_eq!(begun.len(), 2);
    assert!((begun[0].1 - 0.0).abs() < 1e-9, "F1 should start at 0");
    assert!((begun[1].1 - 0.5).abs() < 1e-9, "F2 should start when F1 ends");
    assert!((scheduler.cursor() - 0.8).abs() < 1e-9);
}

#[test]
fn cursor_clamps_to_now_after_idle_gap() {
    let sink = MockSink::default();
    let mut scheduler = PlaybackScheduler::new(sink.clone());

    let id = scheduler.schedule_fragment(fragment(0.5));
    scheduler.source_ended(id);

    // Output clock has moved well past the cursor.
    sink.set_now(2.0);
    scheduler.schedule_fragment(fragment(0.3));

    let begun = sink.begun();
    assert!((begun[1].1 - 2.0).abs() < 1e-9, "idle sink schedules at now, not in the past");
    assert!((scheduler.cursor() - 2.3).abs() < 1e-9);
}

#[test]
fn hard_stop_halts_everything_and_resets_the_cursor() {
    let sink = MockSink::default();
    let mut scheduler = PlaybackScheduler::new(sink.clone());

    scheduler.schedule_fragment(fragment(0.5));
    scheduler.schedule_fragment(fragment(0.3));
    assert_eq!(scheduler.in_flight(), 2);

    sink.set_now(0.2);
    scheduler.hard_stop();

    assert_eq!(sink.halts(), 1);
    assert_eq!(scheduler.in_flight(), 0);
    assert!((scheduler.cursor() - 0.0).abs() < 1e-9);

    // The next fragment starts fresh relative to now, not at the old 0.8.
    scheduler.schedule_fragment(fragment(0.4));
    let begun = sink.begun();
    assert!((begun[2].1 - 0.2).abs() < 1e-9);
}

#[test]
fn sources_deregister_when_playback_ends_naturally() {
    let sink = MockSink::default();
    let mut scheduler = PlaybackScheduler::new(sink.clone());

    let first = scheduler.schedule_fragment(fragment(0.5));
    let second = scheduler.schedule_fragment(fragment(0.3));
    assert_eq!(scheduler.in_flight(), 2);

    scheduler.source_ended(first);
    assert_eq!(scheduler.in_flight(), 1);

    // A stale notification for the same source changes nothing.
    scheduler.source_ended(first);
    assert_eq!(scheduler.in_flight(), 1);

    scheduler.source_ended(second);
    assert_eq!(scheduler.in_flight(), 0);

    // Deregistration alone never rewinds the cursor.
    assert!((scheduler.cursor() - 0.8).abs() < 1e-9);
}

#[test]
fn varying_length_fragments_never_overlap() {
    let sink = MockSink::default();
    let mut scheduler = PlaybackScheduler::new(sink.clone());

    for duration in [0.08, 0.25, 0.04, 0.6] {
        scheduler.schedule_fragment(fragment(duration));
    }

    let begun = sink.begun();
    for pair in begun.windows(2) {
        let end_of_prev = pair[0].1 + pair[0].2;
        assert!(
            (pair[1].1 - end_of_prev).abs() < 1e-6,
            "fragment at {} should start exactly at {}",
            pair[1].1,
            end_of_prev
        );
    }
}
