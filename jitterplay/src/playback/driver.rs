//! Playback driver
//!
//! Pull-driven entry point of a jitter-buffered stream. A stream is split in two halves:
//!
//! - [`StreamHandle`] (producer context, cloneable): `ingest` raw chunks and
//!   `set_transport_state`.
//! - [`PlaybackDriver`] (consumer context): `pull` exactly `n` samples per tick.
//!
//! Only the `IngestQueue`, the transport gate and the stop generation are shared. Health,
//! converter and declick state belong to the consumer alone.
//!
//! ## State machine
//!
//! ```text
//!            play, depth < threshold           threshold met
//!   Idle ───────────────────────────► Buffering ──────────────► Playing
//!    ▲  play, depth >= threshold                                 │   ▲
//!    │  ─────────────────────────────────────────────────────────┘   │ threshold met
//!    │                                                    Exhausted  │
//!    │ pause / stop (from any state)                         ▼       │
//!    └──────────────────────────────────────────────────── Starving ─┘
//! ```
//!
//! Buffering, Starving and Idle ticks emit the declicker's fade tail. While playing, a tick
//! that finds the queue empty (or runs it dry mid-tick) registers one underrun.
//!
//! **Real-time:** `pull_into` never blocks beyond the queue's O(1) critical section, never
//! allocates and never logs above trace level. Diagnostics go through the event ring.

use crate::audio::declicker::Declicker;
use crate::audio::normalizer::ChunkNormalizer;
use crate::audio::resampler::{Converted, SampleRateConverter};
use crate::config::StreamConfig;
use crate::error::{DecodeError, Result};
use crate::playback::events::{event_ring, DriverEvent, EventReceiver, EventSender};
use crate::playback::health::BufferHealthController;
use crate::playback::ingest_queue::{IngestQueue, PushOutcome, QueueStats};
use chrono::Utc;
use jitterplay_common::events::{EventBus, PlaybackState, StreamEvent, TransportState};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Dropped-chunk warnings are logged for the 1st, 101st, 201st... rejected chunk
const DROP_WARN_EVERY: u64 = 100;

/// State shared between producer and consumer
struct Shared {
    stream_id: Uuid,
    queue: IngestQueue,
    /// Transport gate: true after Play, false after Pause/Stop
    playing: AtomicBool,
    /// Bumped by every Stop
    stop_generation: AtomicU64,
    chunks_dropped: AtomicU64,
    bus: Option<EventBus>,
    /// Serializes transport changes so Stop's clear-then-bump is not interleaved with Play
    transport: Mutex<()>,
}

/// Producer-side handle to a stream
#[derive(Clone)]
pub struct StreamHandle {
    shared: Arc<Shared>,
}

impl StreamHandle {
    /// Normalize a raw s16le chunk and queue it
    ///
    /// Malformed chunks are dropped and reported; playback is unaffected.
    pub fn ingest(&self, bytes: &[u8]) -> std::result::Result<(), DecodeError> {
        let frame = match ChunkNormalizer::normalize(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                let count = self.shared.chunks_dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if count % DROP_WARN_EVERY == 1 {
                    warn!("Dropping malformed chunk: {} (total dropped: {})", e, count);
                } else {
                    trace!("Dropping malformed chunk: {}", e);
                }
                self.publish(|stream_id| StreamEvent::ChunkDropped {
                    stream_id,
                    byte_len: bytes.len(),
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
                return Err(e);
            }
        };

        trace!("Ingesting frame of {} samples", frame.len());
        if self.shared.queue.push(frame) == PushOutcome::EvictedOldest {
            let evicted_total = self.shared.queue.stats().evicted;
            self.publish(|stream_id| StreamEvent::FrameEvicted {
                stream_id,
                evicted_total,
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }

    /// Apply a transport command
    ///
    /// `Stop` clears the queue immediately; the consumer resets its own state at the start of
    /// its next pull. Repeated stops are harmless.
    pub fn set_transport_state(&self, state: TransportState) {
        let _guard = self
            .shared
            .transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match state {
            TransportState::Play => {
                self.shared.playing.store(true, Ordering::Release);
            }
            TransportState::Pause => {
                self.shared.playing.store(false, Ordering::Release);
            }
            TransportState::Stop => {
                self.shared.playing.store(false, Ordering::Release);
                let cleared = self.shared.queue.clear();
                self.shared.stop_generation.fetch_add(1, Ordering::AcqRel);
                debug!("Stream stopped, {} queued frames discarded", cleared);
            }
        }
        debug!("Transport state: {}", state);
    }

    /// Frames currently queued
    pub fn depth(&self) -> usize {
        self.shared.queue.depth()
    }

    /// Queue counters
    pub fn queue_stats(&self) -> QueueStats {
        self.shared.queue.stats()
    }

    /// Chunks rejected by the normalizer
    pub fn chunks_dropped(&self) -> u64 {
        self.shared.chunks_dropped.load(Ordering::Relaxed)
    }

    /// Stream identifier carried by every event
    pub fn stream_id(&self) -> Uuid {
        self.shared.stream_id
    }

    fn publish(&self, build: impl FnOnce(Uuid) -> StreamEvent) {
        if let Some(bus) = &self.shared.bus {
            bus.emit_lossy(build(self.shared.stream_id));
        }
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("stream_id", &self.shared.stream_id)
            .field("queue", &self.shared.queue)
            .finish()
    }
}

/// Consumer side of a stream
pub struct PlaybackDriver {
    shared: Arc<Shared>,
    config: StreamConfig,
    state: PlaybackState,
    health: BufferHealthController,
    converter: SampleRateConverter,
    declicker: Declicker,
    seen_generation: u64,
    /// Output samples produced since creation (the stream clock)
    clock_samples: u64,
    events: EventSender,
    event_receiver: Option<EventReceiver>,
}

impl PlaybackDriver {
    /// Open a stream
    ///
    /// # Errors
    /// `Error::InvalidConfiguration` if the configuration is inconsistent.
    pub fn new(config: StreamConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Open a stream whose producer-side events (dropped chunks, evictions) go to `bus`
    pub fn with_event_bus(config: StreamConfig, bus: EventBus) -> Result<Self> {
        Self::build(config, Some(bus))
    }

    fn build(config: StreamConfig, bus: Option<EventBus>) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            stream_id: Uuid::new_v4(),
            queue: IngestQueue::new(config.max_queue_size),
            playing: AtomicBool::new(false),
            stop_generation: AtomicU64::new(0),
            chunks_dropped: AtomicU64::new(0),
            bus,
            transport: Mutex::new(()),
        });
        let (events, event_receiver) = event_ring(config.event_capacity);

        info!(
            "Opened stream {}: {}Hz -> {}Hz, queue {} frames, threshold {} in [{}, {}], {} interpolation",
            shared.stream_id,
            config.input_sample_rate,
            config.output_sample_rate,
            config.max_queue_size,
            config.min_buffer_threshold,
            config.min_floor,
            config.max_ceiling,
            config.interpolation
        );

        Ok(Self {
            health: BufferHealthController::new(&config),
            converter: SampleRateConverter::new(&config),
            declicker: Declicker::new(config.smoothing, config.fade_decay),
            shared,
            config,
            state: PlaybackState::Idle,
            seen_generation: 0,
            clock_samples: 0,
            events,
            event_receiver: Some(event_receiver),
        })
    }

    /// Producer-side handle
    pub fn handle(&self) -> StreamHandle {
        StreamHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Take the receiving end of the diagnostic event ring (once)
    pub fn take_event_receiver(&mut self) -> Option<EventReceiver> {
        self.event_receiver.take()
    }

    /// Produce exactly `frame_size` output samples
    pub fn pull(&mut self, frame_size: usize) -> Vec<f32> {
        let mut out = vec![0.0; frame_size];
        self.pull_into(&mut out);
        out
    }

    /// Fill `out` with output samples
    pub fn pull_into(&mut self, out: &mut [f32]) {
        let generation = self.shared.stop_generation.load(Ordering::Acquire);
        if generation != self.seen_generation {
            self.seen_generation = generation;
            self.reset_local();
        }

        let now = self.stream_time_secs();
        self.clock_samples += out.len() as u64;

        if !self.shared.playing.load(Ordering::Acquire) {
            self.transition(PlaybackState::Idle);
            self.declicker.fade_into(out);
            return;
        }

        let depth = self.shared.queue.depth();
        match self.state {
            PlaybackState::Idle | PlaybackState::Buffering | PlaybackState::Starving => {
                if self.health.admits(depth) {
                    self.transition(PlaybackState::Playing);
                    self.play_tick(out, now);
                } else {
                    if self.state == PlaybackState::Idle {
                        self.transition(PlaybackState::Buffering);
                    }
                    // Nothing queued while playing: every such tick is an underrun
                    if depth == 0 {
                        self.register_underrun(now);
                    }
                    trace!(
                        "{}: depth {} below threshold {}",
                        self.state,
                        depth,
                        self.health.threshold()
                    );
                    self.declicker.fade_into(out);
                }
            }
            PlaybackState::Playing => self.play_tick(out, now),
        }
    }

    fn play_tick(&mut self, out: &mut [f32], now: f64) {
        let old_threshold = self.health.threshold();
        if let Some(new_threshold) = self.health.relax(now) {
            self.events.send(DriverEvent::ThresholdChanged {
                old_threshold,
                new_threshold,
            });
        }

        let mut produced = 0;
        while produced < out.len() {
            match self.converter.next_sample(&self.shared.queue) {
                Converted::Sample(sample) => {
                    out[produced] = self.declicker.smooth(sample);
                    produced += 1;
                }
                Converted::Exhausted => {
                    self.declicker.fade_into(&mut out[produced..]);
                    let at = now + produced as f64 / self.config.output_sample_rate as f64;
                    self.register_underrun(at);
                    self.transition(PlaybackState::Starving);
                    return;
                }
            }
        }
    }

    fn register_underrun(&mut self, now: f64) {
        let old_threshold = self.health.threshold();
        let verdict = self.health.record_underrun(now);
        trace!("Underrun at {:.3}s, streak {}", now, verdict.streak);

        self.events.send(DriverEvent::Underrun {
            underrun_total: self.health.underrun_total(),
            threshold: self.health.threshold(),
            stream_time_secs: now,
        });
        if let Some(new_threshold) = verdict.raised_to {
            self.events.send(DriverEvent::ThresholdChanged {
                old_threshold,
                new_threshold,
            });
        }
    }

    fn transition(&mut self, next: PlaybackState) {
        if self.state == next {
            return;
        }
        trace!("State {} -> {}", self.state, next);
        self.events.send(DriverEvent::StateChanged {
            old_state: self.state,
            new_state: next,
        });
        self.state = next;
    }

    /// Consumer-side part of Stop
    fn reset_local(&mut self) {
        self.converter.reset();
        self.declicker.reset();
        self.health.reset();
        self.transition(PlaybackState::Idle);
    }

    /// Current state machine state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Current admission threshold
    pub fn threshold(&self) -> usize {
        self.health.threshold()
    }

    /// Frames currently queued
    pub fn depth(&self) -> usize {
        self.shared.queue.depth()
    }

    /// Underruns registered since the stream opened
    pub fn underrun_total(&self) -> u64 {
        self.health.underrun_total()
    }

    /// Seconds of output produced since the stream opened
    pub fn stream_time_secs(&self) -> f64 {
        self.clock_samples as f64 / self.config.output_sample_rate as f64
    }

    /// Input position of the converter, in input samples since the last stop
    pub fn cursor(&self) -> f64 {
        self.converter.cursor()
    }

    /// Stream identifier carried by every event
    pub fn stream_id(&self) -> Uuid {
        self.shared.stream_id
    }

    /// Configuration the stream was opened with
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

impl std::fmt::Debug for PlaybackDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackDriver")
            .field("stream_id", &self.shared.stream_id)
            .field("state", &self.state)
            .field("threshold", &self.health.threshold())
            .field("depth", &self.depth())
            .finish()
    }
}
