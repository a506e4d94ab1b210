//! Buffer health controller
//!
//! Hysteresis loop that owns the admission threshold (the queue depth required before
//! playback may start or resume):
//! - Underruns closer together than `underrun_window_secs` form a burst. A burst of
//!   `underrun_burst` underruns raises the threshold one step, capped at `max_ceiling`.
//! - A gap longer than the window restarts the burst, so an isolated underrun never moves the
//!   threshold.
//! - `relax_after_secs` without any underrun lowers the threshold one step, floored at
//!   `min_floor`, and restarts the quiet period.
//!
//! Time is the stream clock in seconds, supplied by the caller. The controller is owned by the
//! consumer context and needs no synchronization.

use crate::config::StreamConfig;
use tracing::debug;

/// What registering an underrun did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnderrunVerdict {
    /// Underruns in the current burst after this one (0 after a raise)
    pub streak: u32,
    /// New threshold if this underrun raised it
    pub raised_to: Option<usize>,
}

/// Adaptive admission threshold
#[derive(Debug, Clone)]
pub struct BufferHealthController {
    initial_threshold: usize,
    min_floor: usize,
    max_ceiling: usize,
    step: usize,
    window_secs: f64,
    burst: u32,
    relax_after_secs: f64,

    threshold: usize,
    streak: u32,
    last_underrun_at: Option<f64>,
    quiet_since: Option<f64>,
    underrun_total: u64,
}

impl BufferHealthController {
    pub fn new(config: &StreamConfig) -> Self {
        let min_floor = config.min_floor.min(config.max_ceiling);
        let max_ceiling = config.max_ceiling;
        let initial_threshold = config.min_buffer_threshold.clamp(min_floor, max_ceiling);

        Self {
            initial_threshold,
            min_floor,
            max_ceiling,
            step: config.threshold_step.max(1),
            window_secs: config.underrun_window_secs,
            burst: config.underrun_burst.max(1),
            relax_after_secs: config.relax_after_secs,
            threshold: initial_threshold,
            streak: 0,
            last_underrun_at: None,
            quiet_since: None,
            underrun_total: 0,
        }
    }

    /// Whether `depth` queued frames are enough to play
    pub fn admits(&self, depth: usize) -> bool {
        depth >= self.threshold
    }

    /// Current admission threshold
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Underruns registered since creation (not cleared by `reset`)
    pub fn underrun_total(&self) -> u64 {
        self.underrun_total
    }

    /// Underruns in the current burst
    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Time of the most recent underrun
    pub fn last_underrun_at(&self) -> Option<f64> {
        self.last_underrun_at
    }

    /// Register an underrun observed at stream time `now`
    pub fn record_underrun(&mut self, now: f64) -> UnderrunVerdict {
        self.underrun_total = self.underrun_total.saturating_add(1);

        let within_window = self
            .last_underrun_at
            .is_some_and(|last| now - last < self.window_secs);
        self.streak = if within_window { self.streak + 1 } else { 1 };
        self.last_underrun_at = Some(now);
        self.quiet_since = Some(now);

        let mut raised_to = None;
        if self.streak >= self.burst {
            self.streak = 0;
            let raised = self.threshold.saturating_add(self.step).min(self.max_ceiling);
            if raised != self.threshold {
                debug!(
                    "Underrun burst: raising admission threshold {} -> {}",
                    self.threshold, raised
                );
                self.threshold = raised;
                raised_to = Some(raised);
            }
        }

        UnderrunVerdict {
            streak: self.streak,
            raised_to,
        }
    }

    /// Relax the threshold after a sustained underrun-free period
    ///
    /// Returns the new threshold if it moved. The first call starts the quiet period.
    pub fn relax(&mut self, now: f64) -> Option<usize> {
        let since = *self.quiet_since.get_or_insert(now);
        if now - since < self.relax_after_secs {
            return None;
        }
        self.quiet_since = Some(now);

        let relaxed = self.threshold.saturating_sub(self.step).max(self.min_floor);
        if relaxed == self.threshold {
            return None;
        }
        debug!(
            "No underruns for {:.1}s: relaxing admission threshold {} -> {}",
            now - since,
            self.threshold,
            relaxed
        );
        self.threshold = relaxed;
        Some(relaxed)
    }

    /// Restore the configured initial threshold and forget underrun history
    pub fn reset(&mut self) {
        self.threshold = self.initial_threshold;
        self.streak = 0;
        self.last_underrun_at = None;
        self.quiet_since = None;
    }
}
