//! # db6502
//!
//! Emulator for the DB6502 hobby computer: a 65C02 at 4MHz with 32K of RAM,
//! 32K of ROM, and a 65C51 ACIA as its only console, shown here as a serial
//! terminal in the host's own terminal.
//!
//! ## Design
//!
//! * no address decoder: devices sit on a chain and the first to claim an
//!   address owns it; I/O goes in before the ROM so it wins the overlap
//! * one IRQ line, the OR of every device's source
//! * real-time pacing: the host loop runs fixed 100us batches to catch up
//!   with the wall clock, capped so a stall doesn't turn into a burst
//! * paste is dripped in one byte per batch, throttled against the firmware's
//!   own serial buffer so BASIC listings don't overrun it
//! * abstract display, input and sound, so the machine never knows what the
//!   host looks like
//!
//! Model
//!
//! main loop
//!  |-- input thread -> events, paste queue
//!  |-- scheduler.catch_up(now, machine)
//!  |    `-- per batch: paste byte -> ACIA; cpu.run(cycles); devices tick
//!  `-- every 17ms: handle events, ring bell, draw terminal + status
pub mod acia;
pub mod bus;
pub mod config;
pub mod cpu;
pub mod device;
pub mod display;
pub mod error;
pub mod frontend;
pub mod input;
pub mod interrupt;
pub mod machine;
pub mod memory;
pub mod paste;
pub mod scheduler;
pub mod sound;
pub mod symbols;
pub mod w65c02;
