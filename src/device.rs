//! The capability interface every memory region and peripheral implements.
use crate::interrupt::InterruptLines;
use std::any::Any;
use std::time::Duration;

/// who is reading; debug reads must not disturb device state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Cpu,
    Debug,
}

/// Something that sits on the address bus.
///
/// A device is probed for every access and decides for itself whether the
/// address is its own: `read` returns `None` and `write` returns `false` for
/// addresses it doesn't claim, so the chain can move on to the next device.
/// Devices must never assume they are the only claimant for a range.
pub trait Device: Any {
    fn name(&self) -> &str;

    /// hardware reset
    fn reset(&mut self, _irq: &mut InterruptLines) {}

    fn read(&mut self, addr: u16, access: Access, irq: &mut InterruptLines) -> Option<u8>;

    fn write(&mut self, addr: u16, value: u8, irq: &mut InterruptLines) -> bool;

    /// called once per scheduler batch
    fn tick(&mut self, _cycles: u32, _elapsed: Duration, _irq: &mut InterruptLines) {}

    /// refresh any output surface the device presents
    fn render(&mut self) {}

    /// called once at teardown, in registration order
    fn shutdown(&mut self) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Offset of `addr` into the window `[base, base + len)`, if it falls inside.
///
/// `addr` below `base` must not wrap around into a valid offset, so the
/// subtraction is checked rather than wrapping.
pub fn window_offset(addr: u16, base: u16, len: usize) -> Option<usize> {
    addr.checked_sub(base)
        .map(usize::from)
        .filter(|offset| *offset < len)
}
