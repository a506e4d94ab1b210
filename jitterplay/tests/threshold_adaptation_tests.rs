//! Adaptive admission threshold tests
//!
//! Underruns are provoked by queueing just enough tiny chunks to be admitted and then pulling
//! more samples than they hold.

mod helpers;

use helpers::*;
use jitterplay::playback::{DriverEvent, EventReceiver};
use jitterplay::{PlaybackDriver, StreamConfig};
use jitterplay_common::events::{PlaybackState, TransportState};

/// Threshold 3 within [1, 4], 1s burst window, burst of 3
fn adaptive_config() -> StreamConfig {
    StreamConfig::new(16_000, 48_000, 20, 3)
}

/// Start playback and run the first tick past the end of a short queue
fn provoke_underrun_and_play(driver: &mut PlaybackDriver) {
    driver.handle().set_transport_state(TransportState::Play);
    provoke_underrun(driver);
    assert_eq!(driver.underrun_total(), 1);
}

/// Queue exactly `threshold` chunks of 10 samples and pull past their end
fn provoke_underrun(driver: &mut PlaybackDriver) {
    let handle = driver.handle();
    for _ in 0..driver.threshold() {
        handle.ingest(&constant_chunk(4000, 10)).unwrap();
    }
    driver.pull(128);
}

fn threshold_changes(rx: &mut EventReceiver) -> Vec<(usize, usize)> {
    let mut changes = Vec::new();
    while let Some(event) = rx.try_recv() {
        if let DriverEvent::ThresholdChanged {
            old_threshold,
            new_threshold,
        } = event
        {
            changes.push((old_threshold, new_threshold));
        }
    }
    changes
}

#[test]
fn test_three_quick_underruns_raise_threshold() {
    let mut driver = PlaybackDriver::new(adaptive_config()).unwrap();
    let mut rx = driver.take_event_receiver().unwrap();
    driver.handle().set_transport_state(TransportState::Play);

    provoke_underrun(&mut driver);
    provoke_underrun(&mut driver);
    assert_eq!(driver.threshold(), 3);

    provoke_underrun(&mut driver);
    assert_eq!(driver.underrun_total(), 3);
    assert_eq!(driver.threshold(), 4);
    assert_eq!(threshold_changes(&mut rx), vec![(3, 4)]);
}

#[test]
fn test_threshold_capped_at_ceiling() {
    let mut driver = PlaybackDriver::new(adaptive_config()).unwrap();
    let mut rx = driver.take_event_receiver().unwrap();
    driver.handle().set_transport_state(TransportState::Play);

    for _ in 0..9 {
        provoke_underrun(&mut driver);
    }
    assert_eq!(driver.underrun_total(), 9);
    assert_eq!(driver.threshold(), 4);
    assert_eq!(threshold_changes(&mut rx), vec![(3, 4)]);
}

#[test]
fn test_sustained_outage_raises_threshold() {
    let mut driver = PlaybackDriver::new(adaptive_config()).unwrap();
    let mut rx = driver.take_event_receiver().unwrap();
    provoke_underrun_and_play(&mut driver);

    // About 56 ms of empty ticks, well inside the window
    for _ in 0..20 {
        driver.pull(128);
    }
    assert_eq!(driver.underrun_total(), 21);
    assert_eq!(driver.threshold(), 4);
    assert_eq!(threshold_changes(&mut rx), vec![(3, 4)]);
}

#[test]
fn test_playing_before_any_data_counts_underruns() {
    let mut driver = PlaybackDriver::new(adaptive_config()).unwrap();
    driver.handle().set_transport_state(TransportState::Play);

    for _ in 0..20 {
        let out = driver.pull(128);
        assert!(out.iter().all(|&s| s == 0.0));
    }
    assert_eq!(driver.state(), PlaybackState::Buffering);
    assert_eq!(driver.underrun_total(), 20);
    assert_eq!(driver.threshold(), 4);
}

#[test]
fn test_isolated_underruns_leave_threshold_alone() {
    let mut driver = PlaybackDriver::new(adaptive_config()).unwrap();
    let handle = driver.handle();
    handle.set_transport_state(TransportState::Play);
    let mut sine = SineChunker::new(440.0, 16_000, 0.5);

    for round in 1..=5u64 {
        // 1.2 s of steady supply, three chunks ahead of the consumer
        for _ in 0..3 {
            handle.ingest(&sine.next_chunk(320)).unwrap();
        }
        for _ in 0..60 {
            handle.ingest(&sine.next_chunk(320)).unwrap();
            driver.pull(960);
        }
        assert_eq!(driver.underrun_total(), round - 1);

        // Three chunks (2880 output samples) left: one tick runs the queue dry
        driver.pull(4096);
        assert_eq!(driver.state(), PlaybackState::Starving);
        assert_eq!(driver.underrun_total(), round);
    }
    assert_eq!(driver.threshold(), 3);
}

#[test]
fn test_quiet_period_relaxes_to_floor() {
    let mut config = adaptive_config();
    config.relax_after_secs = 0.5;
    let mut driver = PlaybackDriver::new(config).unwrap();
    let mut rx = driver.take_event_receiver().unwrap();
    let handle = driver.handle();
    handle.set_transport_state(TransportState::Play);

    for _ in 0..3 {
        provoke_underrun(&mut driver);
    }
    assert_eq!(driver.threshold(), 4);

    // Steady supply: one 320-sample chunk (960 output samples) per two 480-sample ticks
    let mut sine = SineChunker::new(440.0, 16_000, 0.5);
    for _ in 0..5 {
        handle.ingest(&sine.next_chunk(320)).unwrap();
    }
    for tick in 0..300 {
        if tick % 2 == 0 {
            handle.ingest(&sine.next_chunk(320)).unwrap();
        }
        let out = driver.pull(480);
        assert!(all_in_range(&out));
    }

    assert_eq!(driver.underrun_total(), 3);
    assert_eq!(driver.threshold(), 1);
    assert_eq!(
        threshold_changes(&mut rx),
        vec![(3, 4), (4, 3), (3, 2), (2, 1)]
    );
}

#[test]
fn test_stop_restores_initial_threshold() {
    let mut driver = PlaybackDriver::new(adaptive_config()).unwrap();
    let handle = driver.handle();
    handle.set_transport_state(TransportState::Play);
    for _ in 0..3 {
        provoke_underrun(&mut driver);
    }
    assert_eq!(driver.threshold(), 4);

    handle.set_transport_state(TransportState::Stop);
    driver.pull(16);
    assert_eq!(driver.threshold(), 3);
    // Lifetime count survives a stop
    assert_eq!(driver.underrun_total(), 3);
}
