//! Jitter buffer and pull-driven playback

pub mod driver;
pub mod events;
pub mod health;
pub mod ingest_queue;
pub mod monitor;

pub use driver::{PlaybackDriver, StreamHandle};
pub use events::{event_ring, DriverEvent, EventReceiver, EventSender};
pub use health::{BufferHealthController, UnderrunVerdict};
pub use ingest_queue::{IngestQueue, PushOutcome, QueueStats};
pub use monitor::EventMonitor;
