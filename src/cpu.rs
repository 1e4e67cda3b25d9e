//! The processor seam.
//!
//! A `Cpu` only knows how to execute one instruction against a bus. Pacing it
//! to the scheduler's batches, and the debugger's break/step control, live in
//! `Processor`.
use crate::bus::{Bus, SystemBus};

pub trait Cpu {
    /// load the reset vector and return to a known register state
    fn reset(&mut self, bus: &mut dyn Bus);

    /// Execute one instruction, or service the interrupt if `irq` is asserted
    /// and not masked. Returns the cycles taken; never zero.
    fn step(&mut self, bus: &mut dyn Bus, irq: bool) -> u32;

    fn pc(&self) -> u16;
}

/// a bus that can also report the level of the CPU's IRQ input
pub trait IrqBus: Bus {
    fn irq_line(&self) -> bool;
}

impl IrqBus for SystemBus<'_> {
    fn irq_line(&self) -> bool {
        self.irq.line()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// halted under debugger control
    Break,
    /// run exactly one instruction, then break
    Step,
}

/// A CPU plus its run state.
///
/// Instructions don't divide evenly into batches, so the overshoot from one
/// batch is owed by the next; over many batches the CPU runs exactly the
/// cycles it was given.
pub struct Processor<C> {
    cpu: C,
    state: RunState,
    overrun: u32,
}

impl<C: Cpu> Processor<C> {
    pub fn new(cpu: C) -> Self {
        Processor {
            cpu,
            state: RunState::Running,
            overrun: 0,
        }
    }

    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn set_state(&mut self, state: RunState) {
        self.state = state;
        if state == RunState::Break {
            self.overrun = 0;
        }
    }

    pub fn pc(&self) -> u16 {
        self.cpu.pc()
    }

    /// reset the CPU and leave it running
    pub fn reset(&mut self, bus: &mut impl Bus) {
        self.cpu.reset(bus);
        self.overrun = 0;
        self.state = RunState::Running;
    }

    /// Run for a batch of `cycles`, sampling the IRQ line before every
    /// instruction. Returns the cycles actually executed.
    pub fn run(&mut self, bus: &mut impl IrqBus, cycles: u32) -> u32 {
        match self.state {
            RunState::Break => 0,
            RunState::Step => {
                let irq = bus.irq_line();
                let taken = self.cpu.step(bus, irq);
                self.set_state(RunState::Break);
                taken
            }
            RunState::Running => {
                if cycles <= self.overrun {
                    self.overrun -= cycles;
                    return 0;
                }
                let budget = cycles - self.overrun;
                let mut ran = 0;
                while ran < budget {
                    let irq = bus.irq_line();
                    ran += self.cpu.step(bus, irq);
                }
                self.overrun = ran - budget;
                ran
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// takes 3 cycles per step and counts steps
    struct Tally {
        steps: u32,
        irqs: u32,
    }

    impl Cpu for Tally {
        fn reset(&mut self, _bus: &mut dyn Bus) {
            self.steps = 0;
        }
        fn step(&mut self, _bus: &mut dyn Bus, irq: bool) -> u32 {
            self.steps += 1;
            if irq {
                self.irqs += 1;
            }
            3
        }
        fn pc(&self) -> u16 {
            0
        }
    }

    struct Quiet(bool);

    impl Bus for Quiet {
        fn read(&mut self, _addr: u16) -> u8 {
            0
        }
        fn write(&mut self, _addr: u16, _value: u8) {}
    }

    impl IrqBus for Quiet {
        fn irq_line(&self) -> bool {
            self.0
        }
    }

    fn processor() -> Processor<Tally> {
        Processor::new(Tally { steps: 0, irqs: 0 })
    }

    #[test]
    fn test_overrun_carried_to_next_batch() {
        let mut p = processor();
        let mut bus = Quiet(false);
        // 10 cycles at 3 per step is 4 steps, 2 over
        assert_eq!(p.run(&mut bus, 10), 12);
        assert_eq!(p.run(&mut bus, 10), 9);
        assert_eq!(p.cpu().steps, 7);
        // 21 executed against 20 given
        assert_eq!(p.run(&mut bus, 1), 0);
    }

    #[test]
    fn test_break_runs_nothing() {
        let mut p = processor();
        p.set_state(RunState::Break);
        assert_eq!(p.run(&mut Quiet(false), 400), 0);
        assert_eq!(p.cpu().steps, 0);
    }

    #[test]
    fn test_step_then_break() {
        let mut p = processor();
        p.set_state(RunState::Step);
        assert_eq!(p.run(&mut Quiet(false), 400), 3);
        assert_eq!(p.state(), RunState::Break);
        assert_eq!(p.run(&mut Quiet(false), 400), 0);
    }

    #[test]
    fn test_irq_sampled_each_instruction() {
        let mut p = processor();
        p.run(&mut Quiet(true), 9);
        assert_eq!(p.cpu().irqs, 3);
    }

    #[test]
    fn test_reset_resumes() {
        let mut p = processor();
        p.set_state(RunState::Break);
        p.reset(&mut Quiet(false));
        assert_eq!(p.state(), RunState::Running);
    }
}
