//! Board configuration for the DB6502.
//!
//! Memory map:
//!   0x0000-0x7fff  RAM (32K)
//!   0x8000-0xffff  ROM (32K), with I/O carved out of the bottom of it
//!   0x8400-0x8403  65C51 ACIA
//!
//! I/O devices must be registered before the ROM so they win the overlap.
use std::time::Duration;

/// emulated CPU clock
pub const CLOCK_FREQ_HZ: u32 = 4_000_000;

pub const RAM_START: u16 = 0x0000;
pub const RAM_SIZE: usize = 0x8000;

pub const ROM_START: u16 = 0x8000;
pub const ROM_SIZE: usize = 0x8000;

pub const ACIA_ADDR: u16 = 0x8400;
pub const ACIA_IRQ: u8 = 2;

pub const MAX_DEVICES: usize = 16;
pub const MAX_IRQS: usize = 5;

/// one scheduler batch; 400 cycles at 4MHz
pub const BATCH_DURATION: Duration = Duration::from_micros(100);

/// longest stretch of wall time the scheduler will try to catch up on
pub const MAX_CATCH_UP: Duration = Duration::from_millis(50);

/// firmware's serial input ring buffer cursors live in zero page
pub const FIRMWARE_RX_READ_PTR: u16 = 0x0000;
pub const FIRMWARE_RX_WRITE_PTR: u16 = 0x0001;
pub const FIRMWARE_RX_THRESHOLD: u8 = 192;

/// Everything needed to wire up and clock a machine. `Default` is the
/// DB6502 board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    pub clock_hz: u32,
    pub ram_start: u16,
    pub ram_size: usize,
    pub rom_start: u16,
    pub rom_size: usize,
    pub acia_addr: u16,
    pub acia_irq: u8,
    pub max_devices: usize,
    pub batch: Duration,
    pub max_catch_up: Duration,
    pub flow_read_ptr: u16,
    pub flow_write_ptr: u16,
    pub flow_threshold: u8,
}

impl MachineConfig {
    /// cycles the CPU runs per scheduler batch
    pub fn batch_cycles(&self) -> u32 {
        (u128::from(self.clock_hz) * self.batch.as_nanos() / 1_000_000_000) as u32
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            clock_hz: CLOCK_FREQ_HZ,
            ram_start: RAM_START,
            ram_size: RAM_SIZE,
            rom_start: ROM_START,
            rom_size: ROM_SIZE,
            acia_addr: ACIA_ADDR,
            acia_irq: ACIA_IRQ,
            max_devices: MAX_DEVICES,
            batch: BATCH_DURATION,
            max_catch_up: MAX_CATCH_UP,
            flow_read_ptr: FIRMWARE_RX_READ_PTR,
            flow_write_ptr: FIRMWARE_RX_WRITE_PTR,
            flow_threshold: FIRMWARE_RX_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_cycles() {
        assert_eq!(MachineConfig::default().batch_cycles(), 400);
    }

    #[test]
    fn test_rom_covers_top_of_address_space() {
        let c = MachineConfig::default();
        assert_eq!(c.rom_start as usize + c.rom_size, 0x10000);
        assert_eq!(c.ram_start as usize + c.ram_size, c.rom_start as usize);
    }
}
