//! Streaming sample-rate converter
//!
//! Produces one output sample at a time from the frames queued in the `IngestQueue`,
//! interpolating at a fractional input position that advances by `input_rate / output_rate`
//! per output sample. Frame boundaries are crossed transparently: neighbours past the end of
//! the current frame are read from the next queued frame (peeked, not consumed), and the
//! previous frame's last sample is kept for the cubic kernel's left neighbour.
//!
//! When the position runs past the last queued frame the converter reports
//! [`Converted::Exhausted`] instead of inventing data.
//!
//! **Drift:** the position is accumulated in `f64`. Every `resync_interval_secs` of continuous
//! output the accumulated position is compared with the exact rational position
//! (`n * input_rate / output_rate`) and the difference is folded into the next step. One
//! correction never moves more than one input sample, and the step never goes negative, so the
//! cursor stays monotonic.

use crate::audio::types::NormalizedFrame;
use crate::config::{InterpolationMode, StreamConfig};
use crate::playback::ingest_queue::IngestQueue;
use tracing::{debug, trace};

/// Corrections smaller than this are not worth applying
const DRIFT_TOLERANCE: f64 = 1.0e-9;

/// Outcome of producing one output sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Converted {
    /// Interpolated sample in [-1, 1]
    Sample(f32),
    /// No queued data covers the current position
    Exhausted,
}

/// Fractional-position interpolating resampler
#[derive(Debug)]
pub struct SampleRateConverter {
    mode: InterpolationMode,
    input_rate: u64,
    output_rate: u64,
    /// Input samples advanced per output sample
    ratio: f64,

    /// Frame being read
    current: Option<NormalizedFrame>,
    /// Fractional index into `current`
    position: f64,
    /// Last sample of the previously released frame
    previous_last: Option<f32>,

    /// Input samples in frames released since `reset`
    released_total: u64,

    // Drift tracking since the last anchor
    anchor_position: f64,
    anchor_released: u64,
    outputs_since_anchor: u64,
    resync_every: u64,
    pending_correction: f64,
    corrections: u64,
}

impl SampleRateConverter {
    pub fn new(config: &StreamConfig) -> Self {
        let input_rate = config.input_sample_rate.max(1) as u64;
        let output_rate = config.output_sample_rate.max(1) as u64;
        let resync_every =
            ((config.resync_interval_secs * output_rate as f64).round() as u64).max(1);

        debug!(
            "Creating sample-rate converter: {}Hz -> {}Hz, {} interpolation, resync every {} samples",
            input_rate, output_rate, config.interpolation, resync_every
        );

        Self {
            mode: config.interpolation,
            input_rate,
            output_rate,
            ratio: input_rate as f64 / output_rate as f64,
            current: None,
            position: 0.0,
            previous_last: None,
            released_total: 0,
            anchor_position: 0.0,
            anchor_released: 0,
            outputs_since_anchor: 0,
            resync_every,
            pending_correction: 0.0,
            corrections: 0,
        }
    }

    /// Input samples advanced per output sample
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Interpolation policy
    pub fn mode(&self) -> InterpolationMode {
        self.mode
    }

    /// Total input position since `reset`, in input samples
    pub fn cursor(&self) -> f64 {
        self.released_total as f64 + self.position
    }

    /// Drift corrections applied since creation
    pub fn corrections(&self) -> u64 {
        self.corrections
    }

    /// True while a frame is being read
    pub fn has_current_frame(&self) -> bool {
        self.current.is_some()
    }

    /// Produce the next output sample
    pub fn next_sample(&mut self, queue: &IngestQueue) -> Converted {
        if !self.locate(queue) {
            return Converted::Exhausted;
        }
        let Some(frame) = self.current.as_ref() else {
            return Converted::Exhausted;
        };

        let index = self.position.floor() as usize;
        let t = (self.position - index as f64) as f32;
        let value = match self.mode {
            InterpolationMode::Linear => {
                let s0 = sample_at(frame, index);
                let s1 = ahead(frame, index + 1, queue).unwrap_or(s0);
                s0 + (s1 - s0) * t
            }
            InterpolationMode::Cubic => {
                let s0 = sample_at(frame, index);
                let sm1 = if index == 0 {
                    self.previous_last.unwrap_or(s0)
                } else {
                    sample_at(frame, index - 1)
                };
                let s1 = ahead(frame, index + 1, queue).unwrap_or(s0);
                let s2 = ahead(frame, index + 2, queue).unwrap_or(s1);
                catmull_rom(sm1, s0, s1, s2, t)
            }
        };

        self.advance();

        let value = if value.is_finite() { value.clamp(-1.0, 1.0) } else { 0.0 };
        Converted::Sample(value)
    }

    /// Release everything and return the cursor to 0
    pub fn reset(&mut self) {
        self.current = None;
        self.position = 0.0;
        self.previous_last = None;
        self.released_total = 0;
        self.pending_correction = 0.0;
        self.rebase();
    }

    /// Make `current` cover `floor(position)`, taking frames from the queue as needed
    fn locate(&mut self, queue: &IngestQueue) -> bool {
        loop {
            if let Some(frame) = &self.current {
                if (self.position.floor() as usize) < frame.len() {
                    return true;
                }
                // Past the end: release this frame and carry the overhang into the next one
                let len = frame.len();
                self.previous_last = frame.last().or(self.previous_last);
                self.position -= len as f64;
                self.released_total += len as u64;
                self.current = None;
            }

            match queue.pop_front() {
                Some(next) => {
                    trace!("Converter advanced to next frame ({} samples)", next.len());
                    self.current = Some(next);
                }
                None => {
                    // Keep only the phase; whatever gap follows is not part of the timeline
                    self.position = self.position.fract().max(0.0);
                    self.pending_correction = 0.0;
                    self.rebase();
                    return false;
                }
            }
        }
    }

    fn advance(&mut self) {
        let step = (self.ratio + self.pending_correction).max(0.0);
        self.pending_correction = 0.0;
        self.position += step;
        self.outputs_since_anchor += 1;

        if self.outputs_since_anchor >= self.resync_every {
            self.resync();
        }
    }

    /// Compare accumulated position with the exact rational position and schedule a correction
    fn resync(&mut self) {
        let n = self.outputs_since_anchor as u128 * self.input_rate as u128;
        let out = self.output_rate as u128;
        let exact_advance = (n / out) as f64 + (n % out) as f64 / out as f64;
        let expected = self.anchor_position + exact_advance;
        let actual = (self.released_total - self.anchor_released) as f64 + self.position;
        let drift = actual - expected;

        if drift.abs() > DRIFT_TOLERANCE {
            // At most one input sample per correction, never a negative step
            self.pending_correction = (-drift).clamp(-1.0, 1.0).max(-self.ratio);
            self.corrections += 1;
            trace!(
                "Converter drift {:.3e} samples, correcting by {:.3e}",
                drift,
                self.pending_correction
            );
        }

        self.rebase_with(self.position + self.pending_correction);
    }

    fn rebase(&mut self) {
        self.rebase_with(self.position);
    }

    fn rebase_with(&mut self, anchor_position: f64) {
        self.anchor_position = anchor_position;
        self.anchor_released = self.released_total;
        self.outputs_since_anchor = 0;
    }
}

/// Sample `index` counted from the start of `frame`, reaching into the queued frame after it
fn ahead(frame: &NormalizedFrame, index: usize, queue: &IngestQueue) -> Option<f32> {
    if let Some(sample) = frame.get(index) {
        return Some(sample);
    }
    let next = queue.peek_front()?;
    let offset = index.saturating_sub(frame.len());
    next.get(offset).or_else(|| next.last())
}

fn sample_at(frame: &NormalizedFrame, index: usize) -> f32 {
    frame.get(index).or_else(|| frame.last()).unwrap_or(0.0)
}

/// Catmull-Rom spline through `p1` (t = 0) and `p2` (t = 1)
fn catmull_rom(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}
