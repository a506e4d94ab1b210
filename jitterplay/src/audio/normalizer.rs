//! Chunk normalizer
//!
//! Converts raw 16-bit signed little-endian PCM chunks into normalized f32 frames.

use crate::audio::types::NormalizedFrame;
use crate::error::DecodeError;

/// Bytes per input sample (signed 16-bit)
pub const SAMPLE_WIDTH: usize = 2;

/// Scale from i16 to [-1, 1)
const I16_SCALE: f32 = 1.0 / 32768.0;

/// Stateless s16le -> f32 converter
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkNormalizer;

impl ChunkNormalizer {
    /// Normalize a raw byte chunk
    ///
    /// `sample[i] = raw[i] / 32768.0`, clamped to [-1, 1].
    pub fn normalize(bytes: &[u8]) -> Result<NormalizedFrame, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::EmptyChunk);
        }
        if bytes.len() % SAMPLE_WIDTH != 0 {
            return Err(DecodeError::MisalignedChunk {
                len: bytes.len(),
                width: SAMPLE_WIDTH,
            });
        }

        let samples = bytes
            .chunks_exact(SAMPLE_WIDTH)
            .map(|c| scale(i16::from_le_bytes([c[0], c[1]])))
            .collect::<Vec<_>>();

        Ok(NormalizedFrame::from_normalized(samples))
    }

    /// Normalize samples that are already decoded to i16
    pub fn normalize_samples(samples: &[i16]) -> Result<NormalizedFrame, DecodeError> {
        if samples.is_empty() {
            return Err(DecodeError::EmptyChunk);
        }
        Ok(NormalizedFrame::from_normalized(
            samples.iter().copied().map(scale).collect(),
        ))
    }
}

fn scale(raw: i16) -> f32 {
    (raw as f32 * I16_SCALE).clamp(-1.0, 1.0)
}
