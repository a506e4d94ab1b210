//! Core audio data types
//!
//! Defines the normalized frame that flows from the ingest side to the converter.

use std::sync::Arc;

/// NormalizedFrame holds one ingested chunk converted to floating point.
///
/// **Format:**
/// - Samples are f32 in [-1.0, 1.0]
/// - Sample rate is the stream's input rate
///
/// The sample storage is shared, so cloning a frame (as `peek_front` does) is O(1) and never
/// copies audio data.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFrame {
    samples: Arc<[f32]>,
}

impl NormalizedFrame {
    /// Wrap samples that are already known to be finite and within [-1, 1]
    pub(crate) fn from_normalized(samples: Vec<f32>) -> Self {
        Self {
            samples: Arc::from(samples.into_boxed_slice()),
        }
    }

    /// Build a frame from arbitrary f32 samples
    ///
    /// Non-finite samples become 0.0 and everything else is clamped to [-1, 1].
    pub fn from_f32(samples: Vec<f32>) -> Self {
        let sanitized = samples
            .into_iter()
            .map(|s| if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 })
            .collect::<Vec<_>>();
        Self::from_normalized(sanitized)
    }

    /// Number of samples in the frame
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the frame carries no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample at `index`, if present
    pub fn get(&self, index: usize) -> Option<f32> {
        self.samples.get(index).copied()
    }

    /// First sample, if any
    pub fn first(&self) -> Option<f32> {
        self.samples.first().copied()
    }

    /// Last sample, if any
    pub fn last(&self) -> Option<f32> {
        self.samples.last().copied()
    }

    /// All samples in playback order
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Duration of the frame at the given sample rate
    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / sample_rate as f64
    }
}
