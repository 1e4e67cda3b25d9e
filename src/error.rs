use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MachineError>;

/// Everything that can go wrong while assembling or loading the machine.
/// None of these stop a running emulation; the frontend reports them and
/// carries on with whatever state it had.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("ROM image must be {expected} bytes, got {actual}")]
    RomSize { expected: usize, actual: usize },

    #[error("device chain is full ({capacity} devices), cannot add '{name}'")]
    ChainFull { capacity: usize, name: String },

    #[error("cannot add '{name}' after the firmware image, it would be shadowed")]
    ChainSealed { name: String },

    #[error("no firmware loaded")]
    NoFirmware,

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
