//! Event types for the jitterplay event system
//!
//! Provides the diagnostic event definitions and the broadcast `EventBus`.

mod playback_types;

pub use playback_types::{PlaybackState, TransportState};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Diagnostic events emitted by a playback stream
///
/// Events are broadcast via `EventBus` and can be serialized for telemetry collaborators.
/// None of them is an error: they describe degradations the stream already handled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// A consumer tick found the queue empty while playback was requested
    Underrun {
        stream_id: Uuid,
        /// Lifetime underrun count for this stream
        underrun_total: u64,
        /// Admission threshold after this underrun was registered
        threshold: usize,
        /// Stream clock (seconds of output produced) at the underrun
        stream_time_secs: f64,
        timestamp: DateTime<Utc>,
    },

    /// Adaptive admission threshold moved
    ThresholdChanged {
        stream_id: Uuid,
        old_threshold: usize,
        new_threshold: usize,
        timestamp: DateTime<Utc>,
    },

    /// Playback state machine transition
    StateChanged {
        stream_id: Uuid,
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: DateTime<Utc>,
    },

    /// Incoming chunk rejected by the normalizer
    ChunkDropped {
        stream_id: Uuid,
        byte_len: usize,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Oldest queued frame evicted to make room for a new one
    FrameEvicted {
        stream_id: Uuid,
        evicted_total: u64,
        timestamp: DateTime<Utc>,
    },
}

impl StreamEvent {
    /// Stream that produced this event
    pub fn stream_id(&self) -> Uuid {
        match self {
            StreamEvent::Underrun { stream_id, .. }
            | StreamEvent::ThresholdChanged { stream_id, .. }
            | StreamEvent::StateChanged { stream_id, .. }
            | StreamEvent::ChunkDropped { stream_id, .. }
            | StreamEvent::FrameEvicted { stream_id, .. } => *stream_id,
        }
    }
}

/// Event distribution bus
///
/// Uses `tokio::sync::broadcast` internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagging subscribers lose the oldest events
///
/// ```
/// use jitterplay_common::events::{EventBus, PlaybackState, StreamEvent};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
/// bus.emit_lossy(StreamEvent::StateChanged {
///     stream_id: uuid::Uuid::new_v4(),
///     old_state: PlaybackState::Idle,
///     new_state: PlaybackState::Buffering,
///     timestamp: chrono::Utc::now(),
/// });
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StreamEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: StreamEvent,
    ) -> Result<usize, broadcast::error::SendError<StreamEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: StreamEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
