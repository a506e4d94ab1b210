//! Error types for jitterplay
//!
//! Only construction can fail fatally. Steady-state `ingest` reports `DecodeError` for the
//! rejected chunk and carries on; `pull` never fails.

use thiserror::Error;

/// Rejected input chunk
///
/// The chunk is dropped; queue, cursor and playback state are unaffected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Byte length is not a whole number of 16-bit samples
    #[error("chunk length {len} is not a multiple of the {width}-byte sample width")]
    MisalignedChunk { len: usize, width: usize },

    /// Chunk carries no samples
    #[error("chunk is empty")]
    EmptyChunk,
}

/// Main error type for jitterplay
#[derive(Error, Debug)]
pub enum Error {
    /// Stream configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Chunk decode failure
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(#[from] jitterplay_common::Error),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using jitterplay Error
pub type Result<T> = std::result::Result<T, Error>;
