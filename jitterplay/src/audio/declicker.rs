//! De-click smoothing
//!
//! Keeps the last emitted sample and uses it to hide discontinuities:
//! - **smooth**: one-pole low-pass `out = x * (1 - a) + last * a` on every played sample, so
//!   frame boundaries and the return from starvation blend into the previous output.
//! - **fade**: while no data is available each output is `last * decay`, an exponential tail
//!   toward silence instead of a jump to zero.
//!
//! State persists across ticks and is cleared only by `reset` (stream stop).

/// Below this magnitude the fade tail is flushed to exact zero (avoids denormals)
const DENORMAL_FLOOR: f32 = 1.0e-20;

/// Continuity filter between converter output and the device
#[derive(Debug, Clone)]
pub struct Declicker {
    smoothing: f32,
    decay: f32,
    last: f32,
}

impl Declicker {
    /// Create a declicker
    ///
    /// `smoothing` is clamped into [0, 1) and `decay` into [0, 1); the stream config validates
    /// the stricter ranges before construction.
    pub fn new(smoothing: f32, decay: f32) -> Self {
        Self {
            smoothing: sanitize(smoothing),
            decay: sanitize(decay),
            last: 0.0,
        }
    }

    /// Blend a freshly interpolated sample with the previous output
    pub fn smooth(&mut self, sample: f32) -> f32 {
        let sample = if sample.is_finite() { sample } else { self.last };
        let out = sample * (1.0 - self.smoothing) + self.last * self.smoothing;
        self.last = flush(out.clamp(-1.0, 1.0));
        self.last
    }

    /// Next sample of the fade-to-silence tail
    pub fn fade(&mut self) -> f32 {
        self.last = flush(self.last * self.decay);
        self.last
    }

    /// Fill `out` with the fade tail
    pub fn fade_into(&mut self, out: &mut [f32]) {
        for slot in out.iter_mut() {
            *slot = self.fade();
        }
    }

    /// Last emitted sample
    pub fn last(&self) -> f32 {
        self.last
    }

    /// Forget output history
    pub fn reset(&mut self) {
        self.last = 0.0;
    }
}

fn sanitize(coefficient: f32) -> f32 {
    if coefficient.is_finite() {
        coefficient.clamp(0.0, 1.0 - f32::EPSILON)
    } else {
        0.0
    }
}

fn flush(value: f32) -> f32 {
    if value.abs() < DENORMAL_FLOOR {
        0.0
    } else {
        value
    }
}
