//! Playback-related type definitions
//!
//! Supporting types for the playback state machine and the control surface.

use serde::{Deserialize, Serialize};

/// Playback driver state
///
/// - `Idle`: not playing (queue may still hold data)
/// - `Buffering`: play requested, queue below the admission threshold
/// - `Playing`: converter producing samples
/// - `Starving`: was playing, ran out of queued data, waiting for refill
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Buffering,
    Playing,
    Starving,
}

impl PlaybackState {
    /// True when playback has been requested (anything but `Idle`)
    pub fn is_active(self) -> bool {
        !matches!(self, PlaybackState::Idle)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Buffering => write!(f, "buffering"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Starving => write!(f, "starving"),
        }
    }
}

/// Transport command issued by the control surface
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Play,
    Pause,
    Stop,
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportState::Play => write!(f, "play"),
            TransportState::Pause => write!(f, "pause"),
            TransportState::Stop => write!(f, "stop"),
        }
    }
}

impl std::str::FromStr for TransportState {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "play" => Ok(TransportState::Play),
            "pause" => Ok(TransportState::Pause),
            "stop" => Ok(TransportState::Stop),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown transport state '{}'",
                other
            ))),
        }
    }
}
