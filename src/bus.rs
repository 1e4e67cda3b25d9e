//! Address bus arbitration.
//!
//! There is no address decoder table. Devices are kept in the order they
//! were registered and every access walks that list; the first device to
//! claim the address owns it. This is how chip select precedence works on
//! the real board, where I/O is carved out of the ROM window: the I/O devices
//! go in first and the ROM goes in last.
use crate::device::{Access, Device};
use crate::error::{MachineError, Result};
use crate::interrupt::InterruptLines;
use std::time::Duration;
use tracing::{debug, warn};

/// value seen on the data bus when nothing drives it
pub const OPEN_BUS: u8 = 0x00;

/// What the CPU sees: plain byte reads and writes.
pub trait Bus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);
}

/// Side-effect free reads, for anything that inspects machine state without
/// being part of it (flow control, debugger views).
pub trait Peek {
    fn peek(&mut self, addr: u16) -> u8;
}

/// handle to a registered device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(usize);

struct Slot {
    device: Box<dyn Device>,
    visible: bool,
}

pub struct DeviceChain {
    slots: Vec<Slot>,
    capacity: usize,
    sealed: bool,
}

impl DeviceChain {
    pub fn new(capacity: usize) -> Self {
        DeviceChain {
            slots: Vec::with_capacity(capacity),
            capacity,
            sealed: false,
        }
    }

    /// register a device behind everything already on the chain
    pub fn add(&mut self, device: Box<dyn Device>) -> Result<DeviceId> {
        if self.sealed {
            warn!(device = device.name(), "rejected device after firmware image");
            return Err(MachineError::ChainSealed {
                name: device.name().to_string(),
            });
        }
        self.push(device)
    }

    /// Register the firmware image. It has to be the last device, since it
    /// covers the whole upper half of the address space and would otherwise
    /// shadow anything behind it; the chain refuses further devices afterwards.
    pub fn add_firmware(&mut self, device: Box<dyn Device>) -> Result<DeviceId> {
        let id = self.add(device)?;
        self.sealed = true;
        Ok(id)
    }

    fn push(&mut self, device: Box<dyn Device>) -> Result<DeviceId> {
        if self.slots.len() >= self.capacity {
            warn!(device = device.name(), "device chain full");
            return Err(MachineError::ChainFull {
                capacity: self.capacity,
                name: device.name().to_string(),
            });
        }
        debug!(device = device.name(), index = self.slots.len(), "device registered");
        self.slots.push(Slot {
            device,
            visible: true,
        });
        Ok(DeviceId(self.slots.len() - 1))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.device.name())
    }

    pub fn read(&mut self, addr: u16, access: Access, irq: &mut InterruptLines) -> u8 {
        for slot in self.slots.iter_mut() {
            if let Some(value) = slot.device.read(addr, access, irq) {
                return value;
            }
        }
        OPEN_BUS
    }

    pub fn write(&mut self, addr: u16, value: u8, irq: &mut InterruptLines) {
        for slot in self.slots.iter_mut() {
            if slot.device.write(addr, value, irq) {
                return;
            }
        }
    }

    /// reset every device, then drop every interrupt source
    pub fn reset(&mut self, irq: &mut InterruptLines) {
        for slot in self.slots.iter_mut() {
            slot.device.reset(irq);
        }
        irq.reset();
    }

    pub fn tick(&mut self, cycles: u32, elapsed: Duration, irq: &mut InterruptLines) {
        for slot in self.slots.iter_mut() {
            slot.device.tick(cycles, elapsed, irq);
        }
    }

    /// render every visible device
    pub fn render(&mut self) {
        for slot in self.slots.iter_mut().filter(|s| s.visible) {
            slot.device.render();
        }
    }

    pub fn set_visible(&mut self, id: DeviceId, visible: bool) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            slot.visible = visible;
        }
    }

    pub fn is_visible(&self, id: DeviceId) -> bool {
        self.slots.get(id.0).map_or(false, |s| s.visible)
    }

    /// shut down every device in registration order and empty the chain
    pub fn shutdown(&mut self) {
        for mut slot in self.slots.drain(..) {
            debug!(device = slot.device.name(), "device shutdown");
            slot.device.shutdown();
        }
        self.sealed = false;
    }

    pub fn get<T: Device>(&self, id: DeviceId) -> Option<&T> {
        self.slots
            .get(id.0)
            .and_then(|s| s.device.as_any().downcast_ref::<T>())
    }

    pub fn get_mut<T: Device>(&mut self, id: DeviceId) -> Option<&mut T> {
        self.slots
            .get_mut(id.0)
            .and_then(|s| s.device.as_any_mut().downcast_mut::<T>())
    }
}

/// The chain plus the interrupt lines, as seen from the CPU's side.
pub struct SystemBus<'a> {
    pub chain: &'a mut DeviceChain,
    pub irq: &'a mut InterruptLines,
}

impl<'a> SystemBus<'a> {
    pub fn new(chain: &'a mut DeviceChain, irq: &'a mut InterruptLines) -> Self {
        SystemBus { chain, irq }
    }
}

impl Bus for SystemBus<'_> {
    fn read(&mut self, addr: u16) -> u8 {
        self.chain.read(addr, Access::Cpu, self.irq)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.chain.write(addr, value, self.irq)
    }
}

impl Peek for SystemBus<'_> {
    fn peek(&mut self, addr: u16) -> u8 {
        self.chain.read(addr, Access::Debug, self.irq)
    }
}
