//! # machine
//!
//! The DB6502 board: 65C02, 32K RAM, 32K ROM and a 65C51 ACIA, wired through
//! one device chain and one IRQ line.
//!
//! Registration order is the address decoder. RAM goes first, then the ACIA
//! (which sits inside the ROM window), then the ROM last of all once a
//! firmware image is loaded.
use crate::acia::Acia;
use crate::bus::{DeviceChain, DeviceId, SystemBus};
use crate::config::MachineConfig;
use crate::cpu::{Processor, RunState};
use crate::device::Access;
use crate::error::{MachineError, Result};
use crate::interrupt::InterruptLines;
use crate::memory::{MemoryMap, Ram, Rom};
use crate::paste::{FirmwareRing, PasteInjector, PasteQueue};
use crate::scheduler::BatchRunner;
use crate::w65c02::W65C02;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const RESET_VECTOR: u16 = 0xfffc;

pub struct Machine {
    config: MachineConfig,
    chain: DeviceChain,
    irq: InterruptLines,
    cpu: Processor<W65C02>,
    acia: DeviceId,
    rom: Option<DeviceId>,
    paste: PasteInjector,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Result<Self> {
        let mut chain = DeviceChain::new(config.max_devices);
        chain.add(Box::new(Ram::new(config.ram_start, config.ram_size)))?;
        let acia = chain.add(Box::new(Acia::new(config.acia_addr, config.acia_irq)))?;
        let flow = FirmwareRing {
            read_ptr: config.flow_read_ptr,
            write_ptr: config.flow_write_ptr,
            threshold: config.flow_threshold,
        };
        Ok(Machine {
            config,
            chain,
            irq: InterruptLines::new(),
            cpu: Processor::new(W65C02::new()),
            acia,
            rom: None,
            paste: PasteInjector::new(Box::new(flow)),
        })
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn has_firmware(&self) -> bool {
        self.rom.is_some()
    }

    /// Install a firmware image and reset.
    ///
    /// A wrong-sized image is rejected before anything is touched, so a bad
    /// load leaves the running machine exactly as it was.
    pub fn load_rom(&mut self, image: &[u8]) -> Result<()> {
        if image.len() != self.config.rom_size {
            warn!(expected = self.config.rom_size, actual = image.len(), "rejected ROM image");
            return Err(MachineError::RomSize {
                expected: self.config.rom_size,
                actual: image.len(),
            });
        }
        // registration can fail, so the CPU is only halted once it's done
        let replaced = match self.rom {
            Some(id) => self
                .chain
                .get_mut::<Rom>(id)
                .map_or(false, |rom| rom.set_contents(image)),
            None => false,
        };
        if !replaced {
            let id = self
                .chain
                .add_firmware(Box::new(Rom::new(self.config.rom_start, image)))?;
            self.rom = Some(id);
        }
        self.cpu.set_state(RunState::Break);
        info!(bytes = image.len(), "ROM loaded");
        self.reset();
        Ok(())
    }

    pub fn load_rom_file(&mut self, path: &Path) -> Result<()> {
        let image = fs::read(path)?;
        self.load_rom(&image)
    }

    /// Reset every device, release every IRQ source, then reset the CPU from
    /// the vector and set it running.
    pub fn reset(&mut self) {
        self.chain.reset(&mut self.irq);
        let mut bus = SystemBus::new(&mut self.chain, &mut self.irq);
        self.cpu.reset(&mut bus);
        let vector = self
            .rom
            .and_then(|id| self.chain.get::<Rom>(id))
            .and_then(|rom| rom.get_word(RESET_VECTOR));
        debug!(pc = format_args!("{:#06x}", self.cpu.pc()), ?vector, "reset");
    }

    pub fn run_state(&self) -> RunState {
        self.cpu.state()
    }

    pub fn set_run_state(&mut self, state: RunState) {
        debug!(?state, "run state");
        self.cpu.set_state(state);
    }

    pub fn pc(&self) -> u16 {
        self.cpu.pc()
    }

    pub fn cpu(&self) -> &W65C02 {
        self.cpu.cpu()
    }

    pub fn irq_line(&self) -> bool {
        self.irq.line()
    }

    /// a typed byte, straight into the ACIA with no throttling
    pub fn receive_key(&mut self, byte: u8) {
        if let Some(acia) = self.chain.get_mut::<Acia>(self.acia) {
            acia.receive_byte(byte, &mut self.irq);
        }
    }

    /// the queue pasted text waits in; clones can be handed to other threads
    pub fn paste_queue(&self) -> PasteQueue {
        self.paste.queue().clone()
    }

    pub fn paste(&mut self, text: &str) {
        self.paste.queue().paste(text);
    }

    pub fn acia(&self) -> Option<&Acia> {
        self.chain.get::<Acia>(self.acia)
    }

    pub fn acia_mut(&mut self) -> Option<&mut Acia> {
        self.chain.get_mut::<Acia>(self.acia)
    }

    /// side-effect free view of the address space
    pub fn peek(&mut self, addr: u16) -> u8 {
        self.chain.read(addr, Access::Debug, &mut self.irq)
    }

    pub fn render(&mut self) {
        self.chain.render();
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.chain.names()
    }

    pub fn shutdown(&mut self) {
        info!("machine shutdown");
        self.paste.queue().clear();
        self.chain.shutdown();
        self.rom = None;
    }

    /// hand at most one pasted byte to the ACIA
    fn feed_paste(&mut self) {
        let rx_empty = self.acia().map_or(false, Acia::rx_is_empty);
        let mut bus = SystemBus::new(&mut self.chain, &mut self.irq);
        if let Some(byte) = self.paste.next_byte(rx_empty, &mut bus) {
            self.receive_key(byte);
        }
    }
}

impl BatchRunner for Machine {
    /// One batch: pasted input, then the CPU, then every other device.
    /// Nothing runs until there is firmware to run.
    fn run_batch(&mut self, cycles: u32, elapsed: Duration) {
        if self.rom.is_none() {
            return;
        }
        self.feed_paste();
        let mut bus = SystemBus::new(&mut self.chain, &mut self.irq);
        self.cpu.run(&mut bus, cycles);
        self.chain.tick(cycles, elapsed, &mut self.irq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acia::status;

    const BATCH: Duration = Duration::from_micros(100);

    /// A firmware image with `code` at $8000 and the reset vector pointing
    /// at it.
    fn image(code: &[u8]) -> Vec<u8> {
        let mut rom = vec![0xeau8; 0x8000];
        rom[..code.len()].copy_from_slice(code);
        rom[0x7ffc] = 0x00;
        rom[0x7ffd] = 0x80;
        rom
    }

    /// wait for RDRF, read a byte, echo it back; $8400 is inside the ROM
    /// window but belongs to the ACIA
    const ECHO: [u8; 14] = [
        0xad, 0x01, 0x84, // LDA $8401
        0x29, 0x08, //       AND #$08
        0xf0, 0xf9, //       BEQ $8000
        0xad, 0x00, 0x84, // LDA $8400
        0x8d, 0x00, 0x84, // STA $8400
        0x80, // ...         BRA
    ];

    fn echo_machine() -> Machine {
        let mut code = ECHO.to_vec();
        code.push(0xf1); // back to $8000
        let mut m = Machine::new(MachineConfig::default()).unwrap();
        m.load_rom(&image(&code)).unwrap();
        m
    }

    fn run(m: &mut Machine, batches: usize) {
        for _ in 0..batches {
            m.run_batch(400, BATCH);
        }
    }

    fn terminal(m: &Machine) -> Vec<u8> {
        m.acia().unwrap().terminal().as_bytes().to_vec()
    }

    #[test]
    fn test_devices_in_decode_order() {
        let m = echo_machine();
        let names: Vec<&str> = m.devices().collect();
        assert_eq!(names, vec!["RAM", "65C51 ACIA", "ROM"]);
    }

    #[test]
    fn test_reset_vector_after_load() {
        let m = echo_machine();
        assert_eq!(m.pc(), 0x8000);
        assert_eq!(m.run_state(), RunState::Running);
    }

    #[test]
    fn test_nothing_runs_without_firmware() {
        let mut m = Machine::new(MachineConfig::default()).unwrap();
        m.paste("A");
        run(&mut m, 5);
        assert_eq!(m.paste_queue().len(), 1);
    }

    #[test]
    fn test_acia_wins_over_rom() {
        let mut m = echo_machine();
        assert_eq!(m.peek(0x8401), status::TDRE);
        assert_eq!(m.peek(0x8000), 0xad);
    }

    #[test]
    fn test_typed_key_echoes() {
        let mut m = echo_machine();
        m.receive_key(b'A');
        run(&mut m, 2);
        assert_eq!(terminal(&m), b"A");
        assert!(m.acia().unwrap().rx_is_empty());
    }

    #[test]
    fn test_paste_reaches_terminal() {
        let mut m = echo_machine();
        m.paste("10 PRINT\n");
        run(&mut m, 20);
        assert_eq!(terminal(&m), b"10 PRINT\n");
        assert!(m.paste_queue().is_empty());
    }

    #[test]
    fn test_paste_one_byte_per_batch() {
        let mut m = echo_machine();
        m.set_run_state(RunState::Break);
        m.paste("AB");
        run(&mut m, 3);
        // nobody drains the ACIA, so only the first byte gets in
        assert_eq!(m.acia().unwrap().rx_len(), 1);
        assert_eq!(m.paste_queue().len(), 1);
    }

    #[test]
    fn test_paste_held_while_firmware_buffer_full() {
        let mut m = echo_machine();
        m.set_run_state(RunState::Break);
        // fake a firmware ring holding 200 bytes
        {
            let mut bus = SystemBus::new(&mut m.chain, &mut m.irq);
            crate::bus::Bus::write(&mut bus, 0x0000, 10);
            crate::bus::Bus::write(&mut bus, 0x0001, 210);
        }
        m.paste("RUN\n");
        run(&mut m, 10);
        assert_eq!(m.paste_queue().len(), 4);
        assert!(m.acia().unwrap().rx_is_empty());
    }

    #[test]
    fn test_wrong_size_rom_changes_nothing() {
        let mut m = echo_machine();
        m.receive_key(b'x');
        run(&mut m, 2);
        let pc = m.pc();
        let err = m.load_rom(&[0u8; 0x4000]).unwrap_err();
        assert!(matches!(err, MachineError::RomSize { expected: 0x8000, actual: 0x4000 }));
        assert_eq!(m.pc(), pc);
        assert_eq!(m.run_state(), RunState::Running);
        assert_eq!(terminal(&m), b"x");
        assert_eq!(m.peek(0x8000), 0xad);
    }

    #[test]
    fn test_full_chain_rejects_rom_without_halting() {
        let config = MachineConfig {
            max_devices: 2,
            ..MachineConfig::default()
        };
        let mut m = Machine::new(config).unwrap();
        let err = m.load_rom(&image(&ECHO)).unwrap_err();
        assert!(matches!(err, MachineError::ChainFull { capacity: 2, .. }));
        assert_eq!(m.run_state(), RunState::Running);
        assert!(!m.has_firmware());
    }

    #[test]
    fn test_reload_replaces_rom_in_place() {
        let mut m = echo_machine();
        let mut code = vec![0xa9, 0x55];
        code.push(0xdb);
        m.load_rom(&image(&code)).unwrap();
        assert_eq!(m.devices().count(), 3);
        assert_eq!(m.peek(0x8000), 0xa9);
        run(&mut m, 1);
        assert_eq!(m.cpu().a, 0x55);
    }

    #[test]
    fn test_break_and_step() {
        let mut m = echo_machine();
        m.set_run_state(RunState::Break);
        run(&mut m, 3);
        assert_eq!(m.pc(), 0x8000);
        m.set_run_state(RunState::Step);
        run(&mut m, 3);
        assert_eq!(m.pc(), 0x8003);
        assert_eq!(m.run_state(), RunState::Break);
    }

    #[test]
    fn test_acia_irq_reaches_cpu() {
        // CLI; loop: BRA loop. IRQ handler at $9000: LDA $8400; STA $0200; RTI
        let mut code = vec![0x58, 0x80, 0xfe];
        code.resize(0x1000, 0xea);
        code.extend_from_slice(&[0xad, 0x00, 0x84, 0x8d, 0x00, 0x02, 0x40]);
        let mut rom = image(&code);
        rom[0x7ffe] = 0x00;
        rom[0x7fff] = 0x90;
        let mut m = Machine::new(MachineConfig::default()).unwrap();
        m.load_rom(&rom).unwrap();
        run(&mut m, 1);
        m.receive_key(b'Z');
        assert!(m.irq_line());
        run(&mut m, 1);
        assert_eq!(m.peek(0x0200), b'Z');
        assert!(!m.irq_line());
    }

    #[test]
    fn test_reset_clears_irq_and_rx() {
        let mut m = echo_machine();
        m.set_run_state(RunState::Break);
        m.receive_key(b'Q');
        assert!(m.irq_line());
        m.reset();
        assert!(!m.irq_line());
        assert!(m.acia().unwrap().rx_is_empty());
    }

    #[test]
    fn test_shutdown_empties_chain() {
        let mut m = echo_machine();
        m.shutdown();
        assert_eq!(m.devices().count(), 0);
        assert!(!m.has_firmware());
    }
}
