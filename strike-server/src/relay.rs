//! Time-windowed relay buffer — decouples ingest cadence from delivery
//! cadence.
//!
//! The ingest loop appends one lightweight point per valid event; a timer
//! drains the whole buffer every tick and hands non-empty batches to a
//! [`Broadcaster`]. Subscribers see at most one message per tick instead of
//! one per strike, at the cost of up to one tick of delivery latency.

use std::mem;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use strike_core::BroadcastPoint;

/// Shared buffer of points pending delivery.
///
/// `append` and `drain_and_swap` may race freely; the mutex is held only
/// for the push or the swap, never across a broadcast.
#[derive(Default)]
pub struct RelayBuffer {
    pending: Mutex<Vec<BroadcastPoint>>,
}

impl RelayBuffer {
    pub fn new() -> Self {
        RelayBuffer::default()
    }

    pub fn append(&self, point: BroadcastPoint) {
        self.pending.lock().unwrap().push(point);
    }

    /// Take ownership of everything buffered since the last drain and
    /// reset the buffer to empty.
    pub fn drain_and_swap(&self) -> Vec<BroadcastPoint> {
        mem::take(&mut *self.pending.lock().unwrap())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

/// Receives each non-empty drained batch exactly once.
pub trait Broadcaster: Send + Sync {
    fn emit(&self, batch: &[BroadcastPoint]);
}

/// Drain the buffer on a fixed tick, forever.
pub async fn run_drain_loop<B: Broadcaster>(
    buffer: Arc<RelayBuffer>,
    broadcaster: B,
    tick: Duration,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let batch = buffer.drain_and_swap();
        if !batch.is_empty() {
            broadcaster.emit(&batch);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
