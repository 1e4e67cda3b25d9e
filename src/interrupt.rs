//! Shared IRQ line.
//!
//! Every interrupt-capable device owns a source number between 1 and
//! `MAX_IRQS`. The line seen by the CPU is the OR of all sources, and is
//! recomputed whenever any of them changes. Source 0 is wired to nothing, so
//! a device the firmware doesn't service can be parked there.
use crate::config::MAX_IRQS;

/// what a source is doing to its line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Release,
    Raise,
    /// raise for one recomputation, then drop back to released
    Trigger,
}

#[derive(Debug, Clone)]
pub struct InterruptLines {
    sources: [Signal; MAX_IRQS],
    line: bool,
}

impl InterruptLines {
    pub fn new() -> Self {
        InterruptLines {
            sources: [Signal::Release; MAX_IRQS],
            line: false,
        }
    }

    /// release every source and the combined line
    pub fn reset(&mut self) {
        self.sources = [Signal::Release; MAX_IRQS];
        self.line = false;
    }

    /// set source `irq` (1-based) and recompute the combined line
    pub fn signal(&mut self, irq: u8, signal: Signal) {
        let index = match (irq as usize).checked_sub(1) {
            Some(i) if i < MAX_IRQS => i,
            _ => return,
        };
        self.sources[index] = signal;
        self.recompute();
    }

    fn recompute(&mut self) {
        let mut line = false;
        for source in self.sources.iter_mut() {
            match *source {
                Signal::Raise => line = true,
                Signal::Trigger => {
                    *source = Signal::Release;
                    line = true;
                }
                Signal::Release => {}
            }
        }
        self.line = line;
    }

    /// the level presented to the CPU's IRQ input
    pub fn line(&self) -> bool {
        self.line
    }

    pub fn source(&self, irq: u8) -> Option<Signal> {
        (irq as usize)
            .checked_sub(1)
            .and_then(|i| self.sources.get(i))
            .copied()
    }
}

impl Default for InterruptLines {
    fn default() -> Self {
        Self::new()
    }
}
