//! Driver event ring
//!
//! The consumer tick runs on the audio thread, so it cannot timestamp, format or broadcast
//! events itself. It pushes compact `Copy` records into a lock-free SPSC ring instead; the
//! `EventMonitor` drains the ring elsewhere and turns records into `StreamEvent`s.
//!
//! Pushing never blocks or allocates. When the ring is full the record is dropped and counted.

use jitterplay_common::events::PlaybackState;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Event record produced by the consumer tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriverEvent {
    /// Queue ran dry while playing
    Underrun {
        underrun_total: u64,
        threshold: usize,
        stream_time_secs: f64,
    },
    /// Admission threshold moved
    ThresholdChanged {
        old_threshold: usize,
        new_threshold: usize,
    },
    /// State machine transition
    StateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
    },
}

/// Create a connected sender/receiver pair holding up to `capacity` records (minimum 1)
pub fn event_ring(capacity: usize) -> (EventSender, EventReceiver) {
    let (prod, cons) = HeapRb::<DriverEvent>::new(capacity.max(1)).split();
    let dropped = Arc::new(AtomicU64::new(0));
    (
        EventSender {
            prod,
            dropped: Arc::clone(&dropped),
        },
        EventReceiver { cons, dropped },
    )
}

/// Audio-thread side of the ring
pub struct EventSender {
    prod: HeapProd<DriverEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Push a record; returns false (and counts the drop) if the ring is full
    pub fn send(&mut self, event: DriverEvent) -> bool {
        match self.prod.try_push(event) {
            Ok(()) => true,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

impl std::fmt::Debug for EventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender")
            .field("pending", &self.prod.occupied_len())
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .finish()
    }
}

/// Draining side of the ring
pub struct EventReceiver {
    cons: HeapCons<DriverEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventReceiver {
    /// Next pending record
    pub fn try_recv(&mut self) -> Option<DriverEvent> {
        self.cons.try_pop()
    }

    /// Records waiting to be drained
    pub fn pending(&self) -> usize {
        self.cons.occupied_len()
    }

    /// Records lost because the ring was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for EventReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReceiver")
            .field("pending", &self.pending())
            .field("dropped", &self.dropped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (mut tx, mut rx) = event_ring(4);
        tx.send(DriverEvent::ThresholdChanged {
            old_threshold: 3,
            new_threshold: 4,
        });
        tx.send(DriverEvent::StateChanged {
            old_state: PlaybackState::Idle,
            new_state: PlaybackState::Buffering,
        });

        assert_eq!(rx.pending(), 2);
        assert!(matches!(
            rx.try_recv(),
            Some(DriverEvent::ThresholdChanged { new_threshold: 4, .. })
        ));
        assert!(matches!(rx.try_recv(), Some(DriverEvent::StateChanged { .. })));
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_full_ring_drops_and_counts() {
        let (mut tx, mut rx) = event_ring(2);
        let event = DriverEvent::Underrun {
            underrun_total: 1,
            threshold: 3,
            stream_time_secs: 0.5,
        };
        assert!(tx.send(event));
        assert!(tx.send(event));
        assert!(!tx.send(event));
        assert!(!tx.send(event));
        assert_eq!(rx.dropped(), 2);

        // Oldest records survive
        assert_eq!(rx.try_recv(), Some(event));
        assert!(tx.send(event));
        assert_eq!(rx.pending(), 2);
    }
}
