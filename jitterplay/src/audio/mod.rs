//! Audio sample processing
//!
//! Leaf stages of the pipeline: chunk normalization, sample-rate conversion and de-click
//! smoothing. None of them is shared across threads.

pub mod declicker;
pub mod normalizer;
pub mod resampler;
pub mod types;

pub use declicker::Declicker;
pub use normalizer::ChunkNormalizer;
pub use resampler::{Converted, SampleRateConverter};
pub use types::NormalizedFrame;
