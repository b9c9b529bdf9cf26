//! Per-device power notifications emitted by the sync stage.
//!
//! The engine only calls [`Broadcaster::notify`]; getting updates to remote
//! observers is the host's business. Two ready-made sinks are provided:
//! any `FnMut(&PowerUpdate)` closure, and [`UpdateBuffer`], a pre-allocated
//! ring buffer for hosts that poll once per tick.

use crate::event::PowerQualityEvent;
use crate::fixed::{Fixed64, Ticks};
use crate::id::DevicePos;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Update type
// ---------------------------------------------------------------------------

/// Why a device is being notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateCause {
    /// The device is part of this tick's network.
    Delivered,
    /// The device was powered last tick but is no longer in the network.
    Disconnected,
}

/// The aggregated power state of one device for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerUpdate {
    pub tick: Ticks,
    pub pos: DevicePos,
    pub power: Fixed64,
    pub event: PowerQualityEvent,
    pub cause: UpdateCause,
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// Fire-and-forget sink for power updates.
pub trait Broadcaster {
    fn notify(&mut self, update: &PowerUpdate);
}

impl<F> Broadcaster for F
where
    F: FnMut(&PowerUpdate),
{
    fn notify(&mut self, update: &PowerUpdate) {
        self(update)
    }
}

// ---------------------------------------------------------------------------
// UpdateBuffer: pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer of updates. Fixed capacity; when full, the
/// oldest updates are dropped.
#[derive(Debug)]
pub struct UpdateBuffer {
    slots: Vec<Option<PowerUpdate>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Total updates ever written (including dropped).
    total_written: u64,
    dropped: u64,
}

impl UpdateBuffer {
    /// Create a new ring buffer with the given capacity.
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![None; capacity],
            head: 0,
            len: 0,
            total_written: 0,
            dropped: 0,
        }
    }

    /// Push an update. If full, the oldest update is dropped.
    pub fn push(&mut self, update: PowerUpdate) {
        self.slots[self.head] = Some(update);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        } else {
            self.dropped += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Number of updates that were dropped because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Iterate over updates from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &PowerUpdate> {
        // Once full, head points at the oldest entry.
        let start = if self.len < self.capacity() { 0 } else { self.head };
        let capacity = self.capacity();
        (0..self.len).filter_map(move |i| self.slots[(start + i) % capacity].as_ref())
    }

    /// Remove and return all buffered updates, oldest first.
    pub fn drain(&mut self) -> Vec<PowerUpdate> {
        let out: Vec<PowerUpdate> = self.iter().copied().collect();
        self.clear();
        out
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

impl Broadcaster for UpdateBuffer {
    fn notify(&mut self, update: &PowerUpdate) {
        self.push(*update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(tick: Ticks, x: i32) -> PowerUpdate {
        PowerUpdate {
            tick,
            pos: DevicePos::new(x, 0, 0),
            power: Fixed64::from_num(x),
            event: PowerQualityEvent::none(),
            cause: UpdateCause::Delivered,
        }
    }

    #[test]
    fn buffer_keeps_order() {
        let mut buf = UpdateBuffer::new(4);
        for x in 0..3 {
            buf.push(update(1, x));
        }
        let xs: Vec<i32> = buf.iter().map(|u| u.pos.x).collect();
        assert_eq!(xs, vec![0, 1, 2]);
        assert_eq!(buf.dropped_count(), 0);
    }

    #[test]
    fn buffer_drops_oldest_when_full() {
        let mut buf = UpdateBuffer::new(3);
        for x in 0..5 {
            buf.push(update(1, x));
        }
        let xs: Vec<i32> = buf.iter().map(|u| u.pos.x).collect();
        assert_eq!(xs, vec![2, 3, 4]);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.total_written(), 5);
        assert_eq!(buf.dropped_count(), 2);
    }

    #[test]
    fn zero_capacity_clamped() {
        let mut buf = UpdateBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.push(update(1, 1));
        buf.push(update(1, 2));
        assert_eq!(buf.iter().next().map(|u| u.pos.x), Some(2));
    }

    #[test]
    fn drain_empties_buffer() {
        let mut buf = UpdateBuffer::new(8);
        buf.notify(&update(3, 7));
        buf.notify(&update(3, 8));
        let drained = buf.drain();
        assert_eq!(drained.len(), 2);
        assert!(buf.is_empty());
        assert_eq!(buf.total_written(), 2);

        for x in 0..8 {
            buf.push(update(4, x));
        }
        assert_eq!(buf.dropped_count(), 0);
    }

    #[test]
    fn closures_are_broadcasters() {
        let mut seen = Vec::new();
        {
            let mut sink = |u: &PowerUpdate| seen.push(u.pos);
            sink.notify(&update(1, 4));
        }
        assert_eq!(seen, vec![DevicePos::new(4, 0, 0)]);
    }
}
