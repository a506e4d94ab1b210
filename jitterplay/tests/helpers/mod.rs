//! Test helper modules for jitterplay integration tests
//!
//! - audio_generator: s16le chunk generation (sine, constant, silence, ramps)
//! - audio_analysis: zero-crossing frequency/phase estimation, peak and click detection

#![allow(dead_code, unused_imports)]

pub mod audio_analysis;
pub mod audio_generator;

pub use audio_analysis::{all_in_range, detect_clicks, estimate_frequency, peak, positive_crossings};
pub use audio_generator::{constant_chunk, ramp_chunk, silence_chunk, to_s16le, SineChunker};
