//! jitterplay stream configuration
//!
//! `StreamConfig` carries every construction-time knob of a playback stream. Defaults follow
//! the browser worklet this buffer replaces: 40 queued chunks, an admission threshold of 10
//! chunks that may grow to 15, 0.5 smoothing and a 0.95 per-sample fade.

use crate::error::{Error, Result};
use jitterplay_common::config::{load_toml_config, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Interpolation policy of the sample-rate converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMode {
    /// Two-point linear interpolation
    #[default]
    Linear,
    /// Four-point Catmull-Rom interpolation
    Cubic,
}

impl std::fmt::Display for InterpolationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterpolationMode::Linear => write!(f, "linear"),
            InterpolationMode::Cubic => write!(f, "cubic"),
        }
    }
}

impl std::str::FromStr for InterpolationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(InterpolationMode::Linear),
            "cubic" | "catmull-rom" => Ok(InterpolationMode::Cubic),
            other => Err(format!("unknown interpolation mode '{}'", other)),
        }
    }
}

/// Construction-time configuration of one playback stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Sample rate of incoming chunks (Hz)
    pub input_sample_rate: u32,

    /// Sample rate of the output device (Hz)
    pub output_sample_rate: u32,

    /// Maximum number of queued chunks; overflow evicts the oldest
    pub max_queue_size: usize,

    /// Initial admission threshold in queued chunks (also the value restored on stop)
    pub min_buffer_threshold: usize,

    /// Lowest threshold relaxation may reach
    pub min_floor: usize,

    /// Highest threshold underrun bursts may reach
    pub max_ceiling: usize,

    /// Threshold change per adaptation step
    pub threshold_step: usize,

    /// Underruns closer together than this (seconds) form a burst
    pub underrun_window_secs: f64,

    /// Underruns in one burst needed to raise the threshold
    pub underrun_burst: u32,

    /// Underrun-free period (seconds) after which the threshold relaxes one step
    pub relax_after_secs: f64,

    /// Converter interpolation policy
    pub interpolation: InterpolationMode,

    /// Exponential smoothing coefficient `a` in [0, 1)
    pub smoothing: f32,

    /// Per-sample decay factor while starving, in (0, 1)
    pub fade_decay: f32,

    /// Interval (seconds of continuous output) between converter drift checks
    pub resync_interval_secs: f64,

    /// Capacity of the lock-free diagnostic event ring
    pub event_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new(16_000, 48_000, 40, 10)
    }
}

impl StreamConfig {
    /// Create a config with the given rates and queue sizing
    ///
    /// The adaptive range is derived from the initial threshold: the floor is half of it
    /// (at least 1) and the ceiling allows growth by half again, bounded by the queue size.
    pub fn new(
        input_sample_rate: u32,
        output_sample_rate: u32,
        max_queue_size: usize,
        min_buffer_threshold: usize,
    ) -> Self {
        let min_floor = (min_buffer_threshold / 2).max(1);
        let max_ceiling = (min_buffer_threshold + (min_buffer_threshold / 2).max(1))
            .min(max_queue_size)
            .max(min_buffer_threshold);

        Self {
            input_sample_rate,
            output_sample_rate,
            max_queue_size,
            min_buffer_threshold,
            min_floor,
            max_ceiling,
            threshold_step: 1,
            underrun_window_secs: 1.0,
            underrun_burst: 3,
            relax_after_secs: 10.0,
            interpolation: InterpolationMode::Linear,
            smoothing: 0.5,
            fade_decay: 0.95,
            resync_interval_secs: 5.0,
            event_capacity: 256,
        }
    }

    /// Input samples advanced per output sample
    pub fn resample_ratio(&self) -> f64 {
        self.input_sample_rate as f64 / self.output_sample_rate as f64
    }

    /// Reject configurations the stream cannot run with
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: impl Into<String>) -> Result<()> {
            Err(Error::InvalidConfiguration(msg.into()))
        }

        if self.input_sample_rate == 0 || self.output_sample_rate == 0 {
            return invalid(format!(
                "sample rates must be non-zero (input={}, output={})",
                self.input_sample_rate, self.output_sample_rate
            ));
        }
        if self.max_queue_size == 0 {
            return invalid("max_queue_size must be at least 1");
        }
        if self.min_floor == 0 {
            return invalid("min_floor must be at least 1");
        }
        if self.min_floor > self.max_ceiling {
            return invalid(format!(
                "min_floor ({}) exceeds max_ceiling ({})",
                self.min_floor, self.max_ceiling
            ));
        }
        if self.max_ceiling > self.max_queue_size {
            return invalid(format!(
                "max_ceiling ({}) exceeds max_queue_size ({}); playback could never be admitted",
                self.max_ceiling, self.max_queue_size
            ));
        }
        if !(self.min_floor..=self.max_ceiling).contains(&self.min_buffer_threshold) {
            return invalid(format!(
                "min_buffer_threshold ({}) outside [{}, {}]",
                self.min_buffer_threshold, self.min_floor, self.max_ceiling
            ));
        }
        if self.threshold_step == 0 {
            return invalid("threshold_step must be at least 1");
        }
        if self.underrun_burst == 0 {
            return invalid("underrun_burst must be at least 1");
        }
        if !self.smoothing.is_finite() || !(0.0..1.0).contains(&self.smoothing) {
            return invalid(format!("smoothing ({}) must lie in [0, 1)", self.smoothing));
        }
        if !self.fade_decay.is_finite() || self.fade_decay <= 0.0 || self.fade_decay >= 1.0 {
            return invalid(format!("fade_decay ({}) must lie in (0, 1)", self.fade_decay));
        }
        for (name, value) in [
            ("underrun_window_secs", self.underrun_window_secs),
            ("relax_after_secs", self.relax_after_secs),
            ("resync_interval_secs", self.resync_interval_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return invalid(format!("{} ({}) must be positive", name, value));
            }
        }
        if self.event_capacity == 0 {
            return invalid("event_capacity must be at least 1");
        }
        Ok(())
    }
}

/// Top-level TOML config file
///
/// ```toml
/// [logging]
/// level = "jitterplay=debug"
///
/// [stream]
/// input_sample_rate = 16000
/// output_sample_rate = 48000
/// interpolation = "cubic"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub logging: LoggingConfig,
    pub stream: StreamConfig,
}

impl PlayerConfig {
    /// Load from a TOML file (or defaults when `path` is `None`) and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: PlayerConfig = load_toml_config(path)?;
        config.stream.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = StreamConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_queue_size, 40);
        assert_eq!(config.min_buffer_threshold, 10);
        assert_eq!(config.min_floor, 5);
        assert_eq!(config.max_ceiling, 15);
    }

    #[test]
    fn test_small_queue_derivation_is_valid() {
        let config = StreamConfig::new(16_000, 48_000, 10, 3);
        config.validate().unwrap();
        assert_eq!(config.min_floor, 1);
        assert_eq!(config.max_ceiling, 4);
    }

    #[test]
    fn test_ceiling_bounded_by_queue() {
        let config = StreamConfig::new(16_000, 48_000, 4, 4);
        config.validate().unwrap();
        assert_eq!(config.max_ceiling, 4);
    }

    #[test]
    fn test_zero_rate_rejected() {
        let mut config = StreamConfig::default();
        config.output_sample_rate = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_threshold_outside_range_rejected() {
        let mut config = StreamConfig::default();
        config.min_buffer_threshold = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_smoothing_of_one_rejected() {
        let mut config = StreamConfig::default();
        config.smoothing = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_decay_bounds_rejected() {
        let mut config = StreamConfig::default();
        config.fade_decay = 1.0;
        assert!(config.validate().is_err());
        config.fade_decay = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resample_ratio_is_input_over_output() {
        let config = StreamConfig::new(16_000, 48_000, 10, 3);
        assert!((config.resample_ratio() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_interpolation_parse() {
        assert_eq!("Cubic".parse::<InterpolationMode>().unwrap(), InterpolationMode::Cubic);
        assert!("sinc".parse::<InterpolationMode>().is_err());
    }

    #[test]
    fn test_player_config_from_toml() {
        let toml = r#"
            [logging]
            level = "debug"

            [stream]
            input_sample_rate = 22050
            interpolation = "cubic"
        "#;
        let config: PlayerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.stream.input_sample_rate, 22050);
        assert_eq!(config.stream.output_sample_rate, 48_000);
        assert_eq!(config.stream.interpolation, InterpolationMode::Cubic);
        config.stream.validate().unwrap();
    }
}
