use crate::device::{window_offset, Access, Device};
use crate::interrupt::InterruptLines;
use std::any::Any;
use std::io;

// NB. addresses are u16 as per the 6502; lengths are usize to stop endless casting

/// A contiguous block of bytes mapped at a fixed base address.
pub trait MemoryMap {
    /// where the block starts on the bus
    fn base(&self) -> u16;

    /// get a r/w slice of the underlying memory, indexed from the block's base
    fn get_rw_slice(&mut self) -> &mut [u8];

    /// get a r/o slice of the underlying memory, indexed from the block's base
    fn get_ro_slice(&self) -> &[u8];

    /// overwrite the start of the block with whatever the reader holds;
    /// anything past the end of the block is left unread
    fn write_any(&mut self, reader: &mut impl io::Read) -> Result<usize, io::Error> {
        let bytes = self.get_rw_slice();
        let mut filled = 0;
        while filled < bytes.len() {
            match reader.read(&mut bytes[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        Ok(filled)
    }

    /// get a little-endian word (vectors); wraps within the block
    fn get_word(&self, addr: u16) -> Option<u16> {
        let bytes = self.get_ro_slice();
        let lo = window_offset(addr, self.base(), bytes.len())?;
        let hi = window_offset(addr.wrapping_add(1), self.base(), bytes.len())?;
        Some(u16::from_le_bytes([bytes[lo], bytes[hi]]))
    }
}

/// read/write memory
pub struct Ram {
    base: u16,
    bytes: Box<[u8]>,
}

impl Ram {
    pub fn new(base: u16, len: usize) -> Self {
        Ram {
            base,
            bytes: vec![0u8; len].into_boxed_slice(),
        }
    }
}

impl MemoryMap for Ram {
    fn base(&self) -> u16 {
        self.base
    }
    fn get_rw_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
    fn get_ro_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Device for Ram {
    fn name(&self) -> &str {
        "RAM"
    }

    fn read(&mut self, addr: u16, _access: Access, _irq: &mut InterruptLines) -> Option<u8> {
        window_offset(addr, self.base, self.bytes.len()).map(|o| self.bytes[o])
    }

    fn write(&mut self, addr: u16, value: u8, _irq: &mut InterruptLines) -> bool {
        match window_offset(addr, self.base, self.bytes.len()) {
            Some(o) => {
                self.bytes[o] = value;
                true
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Firmware image. Writes inside the window are claimed and dropped, so the
/// CPU can't scribble over its own code and nothing further down the chain
/// sees them either.
pub struct Rom {
    base: u16,
    bytes: Box<[u8]>,
}

impl Rom {
    pub fn new(base: u16, image: &[u8]) -> Self {
        Rom {
            base,
            bytes: image.into(),
        }
    }

    /// replace the contents; the image must be exactly the ROM's size
    pub fn set_contents(&mut self, image: &[u8]) -> bool {
        if image.len() != self.bytes.len() {
            return false;
        }
        let mut reader = image;
        // a slice reader can't fail
        self.write_any(&mut reader).map_or(false, |n| n == image.len())
    }
}

impl MemoryMap for Rom {
    fn base(&self) -> u16 {
        self.base
    }
    fn get_rw_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
    fn get_ro_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Device for Rom {
    fn name(&self) -> &str {
        "ROM"
    }

    fn read(&mut self, addr: u16, _access: Access, _irq: &mut InterruptLines) -> Option<u8> {
        window_offset(addr, self.base, self.bytes.len()).map(|o| self.bytes[o])
    }

    fn write(&mut self, addr: u16, _value: u8, _irq: &mut InterruptLines) -> bool {
        window_offset(addr, self.base, self.bytes.len()).is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
