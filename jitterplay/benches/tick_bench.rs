//! Pull Tick Performance Benchmark
//!
//! Measures the consumer tick (`pull_into`) and the producer path (`ingest`).
//!
//! **Goal:** A 128-sample tick at 48 kHz leaves a 2.67 ms budget
//! **Target:** <10 us per tick (>250x realtime)

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use jitterplay::{InterpolationMode, PlaybackDriver, StreamConfig};
use jitterplay_common::events::TransportState;

const CHUNK_SAMPLES: usize = 320;

fn sine_chunk() -> Vec<u8> {
    (0..CHUNK_SAMPLES)
        .flat_map(|i| {
            let v = ((i as f32 * 0.17).sin() * 16000.0) as i16;
            v.to_le_bytes()
        })
        .collect()
}

/// Driver with a full queue, already playing
fn primed_driver(mode: InterpolationMode) -> PlaybackDriver {
    let mut config = StreamConfig::new(16_000, 48_000, 40, 10);
    config.interpolation = mode;
    let driver = PlaybackDriver::new(config).unwrap();
    let handle = driver.handle();
    let chunk = sine_chunk();
    for _ in 0..40 {
        handle.ingest(&chunk).unwrap();
    }
    handle.set_transport_state(TransportState::Play);
    driver
}

fn bench_pull_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("pull_tick");

    for (name, mode) in [
        ("linear_128", InterpolationMode::Linear),
        ("cubic_128", InterpolationMode::Cubic),
    ] {
        group.bench_function(name, |b| {
            let mut buffer = vec![0.0f32; 128];
            // 40 chunks last 300 ticks; rebuild before the queue runs dry
            b.iter_batched_ref(
                || primed_driver(mode),
                |driver| {
                    for _ in 0..200 {
                        driver.pull_into(black_box(&mut buffer));
                    }
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.bench_function("starving_fade_128", |b| {
        let mut driver = PlaybackDriver::new(StreamConfig::new(16_000, 48_000, 40, 10)).unwrap();
        driver.handle().set_transport_state(TransportState::Play);
        let mut buffer = vec![0.0f32; 128];
        b.iter(|| driver.pull_into(black_box(&mut buffer)));
    });

    group.finish();
}

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");
    let chunk = sine_chunk();

    group.bench_function("ingest_20ms_chunk", |b| {
        let driver = PlaybackDriver::new(StreamConfig::default()).unwrap();
        let handle = driver.handle();
        // Queue stays full, so every push also evicts
        b.iter(|| handle.ingest(black_box(&chunk)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_pull_tick, bench_ingest);
criterion_main!(benches);
