//! PCM chunk generation for integration tests
//!
//! Produces raw 16-bit signed little-endian chunks, the wire format `StreamHandle::ingest`
//! accepts.

use std::f64::consts::TAU;

/// Encode samples as s16le bytes
pub fn to_s16le(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Chunk of `samples` zeros
pub fn silence_chunk(samples: usize) -> Vec<u8> {
    vec![0u8; samples * 2]
}

/// Chunk holding one repeated value
pub fn constant_chunk(value: i16, samples: usize) -> Vec<u8> {
    to_s16le(&vec![value; samples])
}

/// Chunk counting up from `start` in steps of `step`
pub fn ramp_chunk(start: i16, step: i16, samples: usize) -> Vec<u8> {
    let values: Vec<i16> = (0..samples)
        .map(|i| start.saturating_add(step.saturating_mul(i as i16)))
        .collect();
    to_s16le(&values)
}

/// Phase-continuous sine split into fixed-size chunks
///
/// Phase 0 at the first sample, so positive-going zero crossings fall at `k / frequency`
/// seconds.
#[derive(Debug, Clone)]
pub struct SineChunker {
    frequency: f64,
    sample_rate: u32,
    amplitude: f64,
    index: u64,
}

impl SineChunker {
    pub fn new(frequency: f64, sample_rate: u32, amplitude: f64) -> Self {
        Self {
            frequency,
            sample_rate,
            amplitude: amplitude.clamp(0.0, 1.0),
            index: 0,
        }
    }

    /// Next `samples` samples as s16le bytes
    pub fn next_chunk(&mut self, samples: usize) -> Vec<u8> {
        let values: Vec<i16> = (0..samples)
            .map(|_| {
                let t = self.index as f64 / self.sample_rate as f64;
                self.index += 1;
                ((TAU * self.frequency * t).sin() * self.amplitude * i16::MAX as f64).round() as i16
            })
            .collect();
        to_s16le(&values)
    }

    /// `count` consecutive chunks
    pub fn chunks(&mut self, samples: usize, count: usize) -> Vec<Vec<u8>> {
        (0..count).map(|_| self.next_chunk(samples)).collect()
    }
}
