//! Ingest Queue for Normalized Frames
//!
//! Bounded FIFO shared between the producer context (`push` from the transport) and the
//! consumer context (`peek_front` / `pop_front` from the audio tick).
//!
//! ## Design
//!
//! ```text
//! transport → ChunkNormalizer → push()
//!                                  ↓
//!                            IngestQueue
//!                            - Capacity: max_queue_size frames
//!                            - Overflow: evict oldest, keep newest
//!                                  ↓
//!                      peek_front() / pop_front()
//!                                  ↓
//!                         SampleRateConverter
//! ```
//!
//! ## Thread Safety
//!
//! The ring is a `ringbuf::HeapRb` behind a `Mutex`. Overflow eviction happens on the
//! producer side, which an SPSC split cannot do, so both sides share one lock. The lock is held
//! only for O(1) index updates; frames leaving the queue are dropped after the guard is
//! released. Depth is mirrored in an atomic so the consumer's health check needs no lock.

use crate::audio::types::NormalizedFrame;
use ringbuf::{traits::*, HeapRb};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

/// Result of a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Frame appended, nothing evicted
    Queued,
    /// Frame appended after evicting the oldest queued frame
    EvictedOldest,
}

/// Queue counters snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Frames accepted since creation
    pub pushed: u64,
    /// Frames handed to the consumer since creation
    pub popped: u64,
    /// Frames evicted by overflow since creation
    pub evicted: u64,
    /// Frames removed by `clear`
    pub cleared: u64,
    /// Current depth
    pub depth: usize,
    /// Maximum depth
    pub capacity: usize,
}

/// Bounded drop-oldest FIFO of normalized frames
pub struct IngestQueue {
    ring: Mutex<HeapRb<NormalizedFrame>>,
    capacity: usize,
    depth: AtomicUsize,
    pushed: AtomicU64,
    popped: AtomicU64,
    evicted: AtomicU64,
    cleared: AtomicU64,
}

impl std::fmt::Debug for IngestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestQueue")
            .field("capacity", &self.capacity)
            .field("depth", &self.depth())
            .field("evicted", &self.evicted.load(Ordering::Relaxed))
            .finish()
    }
}

impl IngestQueue {
    /// Create an empty queue holding at most `max_queue_size` frames (minimum 1)
    pub fn new(max_queue_size: usize) -> Self {
        let capacity = max_queue_size.max(1);
        debug!("Creating ingest queue: capacity={} frames", capacity);

        Self {
            ring: Mutex::new(HeapRb::new(capacity)),
            capacity,
            depth: AtomicUsize::new(0),
            pushed: AtomicU64::new(0),
            popped: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            cleared: AtomicU64::new(0),
        }
    }

    fn ring(&self) -> MutexGuard<'_, HeapRb<NormalizedFrame>> {
        // A panic elsewhere never leaves the ring half-updated; keep serving audio.
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a frame, evicting the oldest one if the queue is full
    pub fn push(&self, frame: NormalizedFrame) -> PushOutcome {
        let evicted = {
            let mut ring = self.ring();
            let evicted = ring.push_overwrite(frame);
            self.depth.store(ring.occupied_len(), Ordering::Release);
            evicted
        };
        self.pushed.fetch_add(1, Ordering::Relaxed);

        match evicted {
            None => PushOutcome::Queued,
            Some(old) => {
                let count = self.evicted.fetch_add(1, Ordering::Relaxed) + 1;
                if count % 100 == 1 {
                    warn!(
                        "Ingest queue overflow, evicted oldest frame of {} samples (total evicted: {})",
                        old.len(),
                        count
                    );
                } else {
                    trace!("Ingest queue overflow (total evicted: {})", count);
                }
                drop(old);
                PushOutcome::EvictedOldest
            }
        }
    }

    /// Oldest frame without removing it
    pub fn peek_front(&self) -> Option<NormalizedFrame> {
        self.ring().try_peek().cloned()
    }

    /// Remove and return the oldest frame
    pub fn pop_front(&self) -> Option<NormalizedFrame> {
        let frame = {
            let mut ring = self.ring();
            let frame = ring.try_pop();
            self.depth.store(ring.occupied_len(), Ordering::Release);
            frame
        };
        if frame.is_some() {
            self.popped.fetch_add(1, Ordering::Relaxed);
        }
        frame
    }

    /// Remove every queued frame, returning how many were removed
    pub fn clear(&self) -> usize {
        let mut drained = Vec::with_capacity(self.capacity);
        {
            let mut ring = self.ring();
            while let Some(frame) = ring.try_pop() {
                drained.push(frame);
            }
            self.depth.store(0, Ordering::Release);
        }
        let count = drained.len();
        self.cleared.fetch_add(count as u64, Ordering::Relaxed);
        if count > 0 {
            debug!("Ingest queue cleared ({} frames)", count);
        }
        count
    }

    /// Current number of queued frames
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Maximum number of queued frames
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the queue counters
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            cleared: self.cleared.load(Ordering::Relaxed),
            depth: self.depth(),
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(value: f32) -> NormalizedFrame {
        NormalizedFrame::from_f32(vec![value; 4])
    }

    #[test]
    fn test_fifo_order() {
        let queue = IngestQueue::new(8);
        for i in 0..5 {
            assert_eq!(queue.push(frame(i as f32 / 10.0)), PushOutcome::Queued);
        }
        for i in 0..5 {
            assert_eq!(queue.pop_front().unwrap().first(), Some(i as f32 / 10.0));
        }
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn test_overflow_keeps_newest() {
        let queue = IngestQueue::new(3);
        for i in 0..7 {
            queue.push(frame(i as f32 / 10.0));
        }
        assert_eq!(queue.depth(), 3);
        assert_eq!(queue.stats().evicted, 4);

        let retained: Vec<f32> = std::iter::from_fn(|| queue.pop_front())
            .map(|f| f.first().unwrap())
            .collect();
        assert_eq!(retained, vec![0.4, 0.5, 0.6]);
    }

    #[test]
    fn test_push_reports_eviction() {
        let queue = IngestQueue::new(1);
        assert_eq!(queue.push(frame(0.1)), PushOutcome::Queued);
        assert_eq!(queue.push(frame(0.2)), PushOutcome::EvictedOldest);
        assert_eq!(queue.peek_front().unwrap().first(), Some(0.2));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let queue = IngestQueue::new(4);
        queue.push(frame(0.3));
        assert_eq!(queue.peek_front().unwrap().first(), Some(0.3));
        assert_eq!(queue.depth(), 1);
        assert_eq!(queue.pop_front().unwrap().first(), Some(0.3));
        assert_eq!(queue.depth(), 0);
    }

    #[test]
    fn test_empty_reads_return_none() {
        let queue = IngestQueue::new(4);
        assert!(queue.peek_front().is_none());
        assert!(queue.pop_front().is_none());
        assert_eq!(queue.stats().popped, 0);
    }

    #[test]
    fn test_clear() {
        let queue = IngestQueue::new(4);
        queue.push(frame(0.1));
        queue.push(frame(0.2));
        assert_eq!(queue.clear(), 2);
        assert_eq!(queue.depth(), 0);
        assert_eq!(queue.clear(), 0);
        assert_eq!(queue.stats().cleared, 2);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let queue = IngestQueue::new(0);
        assert_eq!(queue.capacity(), 1);
    }
}
