//! Bulk text input.
//!
//! Pasting a BASIC listing straight into the ACIA would overrun the firmware:
//! its serial input handler copies bytes from the ACIA into its own small
//! ring buffer in RAM, and the interpreter drains that far slower than the
//! emulator could deliver. So pasted text sits in a queue and is dripped in
//! one byte per scheduler batch, and only while both the ACIA receive buffer
//! is empty and the firmware's buffer has room.
use crate::bus::Peek;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// How full is the consumer on the far side of the ACIA?
pub trait BufferOccupancy {
    fn has_room(&self, bus: &mut dyn Peek) -> bool;
}

/// A firmware-owned ring buffer described by two one-byte cursors in memory.
///
/// The fill level is `write - read` in 8-bit arithmetic, which is correct
/// across the wrap for a 256 entry ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareRing {
    pub read_ptr: u16,
    pub write_ptr: u16,
    /// deliver only while fewer than this many slots are used
    pub threshold: u8,
}

impl FirmwareRing {
    pub fn used(&self, bus: &mut dyn Peek) -> u8 {
        let write = bus.peek(self.write_ptr);
        let read = bus.peek(self.read_ptr);
        write.wrapping_sub(read)
    }
}

impl BufferOccupancy for FirmwareRing {
    fn has_room(&self, bus: &mut dyn Peek) -> bool {
        self.used(bus) < self.threshold
    }
}

/// for firmware that reads the ACIA directly with no buffer of its own
#[derive(Debug, Clone, Copy, Default)]
pub struct Unthrottled;

impl BufferOccupancy for Unthrottled {
    fn has_room(&self, _bus: &mut dyn Peek) -> bool {
        true
    }
}

/// Pending paste bytes. Cheap to clone; every clone shares one queue, so the
/// input thread can paste while the machine drains.
#[derive(Debug, Clone, Default)]
pub struct PasteQueue {
    inner: Arc<Mutex<VecDeque<u8>>>,
}

impl PasteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<u8>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// queue `text`, turning LF into the CR the firmware expects from Enter
    pub fn paste(&self, text: &str) {
        let mut queue = self.lock();
        queue.extend(text.bytes().map(|b| if b == b'\n' { b'\r' } else { b }));
    }

    pub fn pop(&self) -> Option<u8> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Queue plus the throttle that decides when the next byte may go.
pub struct PasteInjector {
    queue: PasteQueue,
    flow: Box<dyn BufferOccupancy + Send>,
}

impl PasteInjector {
    pub fn new(flow: Box<dyn BufferOccupancy + Send>) -> Self {
        PasteInjector {
            queue: PasteQueue::new(),
            flow,
        }
    }

    pub fn queue(&self) -> &PasteQueue {
        &self.queue
    }

    /// The byte to deliver this batch, if any: at most one, and only when the
    /// ACIA has nothing waiting and the downstream buffer has room.
    pub fn next_byte(&mut self, rx_empty: bool, bus: &mut dyn Peek) -> Option<u8> {
        if !rx_empty || self.queue.is_empty() {
            return None;
        }
        if !self.flow.has_room(bus) {
            return None;
        }
        self.queue.pop()
    }
}
