//! # jitterplay
//!
//! Jitter buffer for real-time playback of irregularly arriving PCM chunks.
//!
//! **Purpose:** Accept raw 16-bit chunks from a transport at one sample rate and hand a
//! fixed-cadence, click-free f32 stream to an audio output running at another rate.
//!
//! **Architecture:** producer `StreamHandle::ingest` -> bounded `IngestQueue` ->
//! consumer `PlaybackDriver::pull` (health check -> sample-rate converter -> declicker).
//!
//! ```
//! use jitterplay::{PlaybackDriver, StreamConfig};
//! use jitterplay_common::events::TransportState;
//!
//! let mut driver = PlaybackDriver::new(StreamConfig::new(16_000, 48_000, 10, 3)).unwrap();
//! let handle = driver.handle();
//! handle.set_transport_state(TransportState::Play);
//! for _ in 0..3 {
//!     handle.ingest(&[0u8; 640]).unwrap();
//! }
//! assert_eq!(driver.pull(128).len(), 128);
//! ```

pub mod audio;
pub mod config;
pub mod error;
#[cfg(feature = "device-output")]
pub mod output;
pub mod playback;

pub use config::{InterpolationMode, PlayerConfig, StreamConfig};
pub use error::{DecodeError, Error, Result};
pub use playback::{EventMonitor, PlaybackDriver, StreamHandle};
