//! # jitterplay common library
//!
//! Shared code for the jitterplay crates:
//! - Error type
//! - Configuration file resolution and logging configuration
//! - Stream event types and the broadcast `EventBus`
//! - Playback / transport state enums

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{EventBus, PlaybackState, StreamEvent, TransportState};
