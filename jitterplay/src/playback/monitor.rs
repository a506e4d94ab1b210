//! Background event monitor
//!
//! Drains the driver's event ring off the audio thread, timestamps each record, logs it and
//! publishes it on the `EventBus`. Runs either as a periodic tokio task (`spawn`) or by calling
//! `drain` from any non-audio context.

use super::events::{DriverEvent, EventReceiver};
use chrono::{DateTime, Utc};
use jitterplay_common::events::{EventBus, StreamEvent};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Underrun warnings are logged for the 1st, 51st, 101st... underrun
const UNDERRUN_WARN_EVERY: u64 = 50;

/// Converts driver records into stream events
pub struct EventMonitor {
    receiver: EventReceiver,
    stream_id: Uuid,
    bus: EventBus,
    forwarded: u64,
    reported_drops: u64,
}

impl EventMonitor {
    pub fn new(receiver: EventReceiver, stream_id: Uuid, bus: EventBus) -> Self {
        Self {
            receiver,
            stream_id,
            bus,
            forwarded: 0,
            reported_drops: 0,
        }
    }

    /// Events published since creation
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    /// Publish every pending record, returning how many were published
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while let Some(record) = self.receiver.try_recv() {
            log_record(&record);
            self.bus
                .emit_lossy(to_stream_event(record, self.stream_id, Utc::now()));
            count += 1;
        }
        self.forwarded += count as u64;

        let dropped = self.receiver.dropped();
        if dropped > self.reported_drops {
            warn!(
                "Event ring full: {} driver events lost (total {})",
                dropped - self.reported_drops,
                dropped
            );
            self.reported_drops = dropped;
        }

        count
    }

    /// Drain every `period` on the tokio runtime until the task is aborted
    pub fn spawn(mut self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            debug!(
                "Event monitor started for stream {} ({}ms interval)",
                self.stream_id,
                period.as_millis()
            );

            loop {
                interval.tick().await;
                self.drain();
            }
        })
    }
}

/// Stamp a driver record with its stream and wall-clock time
pub fn to_stream_event(record: DriverEvent, stream_id: Uuid, timestamp: DateTime<Utc>) -> StreamEvent {
    match record {
        DriverEvent::Underrun {
            underrun_total,
            threshold,
            stream_time_secs,
        } => StreamEvent::Underrun {
            stream_id,
            underrun_total,
            threshold,
            stream_time_secs,
            timestamp,
        },
        DriverEvent::ThresholdChanged {
            old_threshold,
            new_threshold,
        } => StreamEvent::ThresholdChanged {
            stream_id,
            old_threshold,
            new_threshold,
            timestamp,
        },
        DriverEvent::StateChanged {
            old_state,
            new_state,
        } => StreamEvent::StateChanged {
            stream_id,
            old_state,
            new_state,
            timestamp,
        },
    }
}

fn log_record(record: &DriverEvent) {
    match *record {
        DriverEvent::Underrun {
            underrun_total,
            threshold,
            stream_time_secs,
        } => {
            if underrun_total % UNDERRUN_WARN_EVERY == 1 {
                warn!(
                    "Buffer underrun at {:.3}s (total: {}, threshold: {} frames)",
                    stream_time_secs, underrun_total, threshold
                );
            } else {
                debug!(
                    "Buffer underrun at {:.3}s (total: {})",
                    stream_time_secs, underrun_total
                );
            }
        }
        DriverEvent::ThresholdChanged {
            old_threshold,
            new_threshold,
        } => {
            info!(
                "Admission threshold {} -> {} frames",
                old_threshold, new_threshold
            );
        }
        DriverEvent::StateChanged {
            old_state,
            new_state,
        } => {
            debug!("Playback state {} -> {}", old_state, new_state);
        }
    }
}
