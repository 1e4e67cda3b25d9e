//! Glue between the host (keys, screen, speaker) and the machine.
use crate::cpu::RunState;
use crate::display::View;
use crate::error::{MachineError, Result};
use crate::input::HostEvent;
use crate::machine::Machine;
use crate::scheduler::{Scheduler, SpeedMeter};
use crate::symbols::Symbols;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// lines moved per PageUp/PageDown
const SCROLL_PAGE: usize = 10;

/// terminal rows assumed until the display reports its size
const DEFAULT_TEXT_ROWS: usize = 24;

pub struct App {
    machine: Machine,
    scheduler: Scheduler,
    speed: SpeedMeter,
    symbols: Symbols,
    rom_path: Option<PathBuf>,
    break_on_load: bool,
    scroll: usize,
    text_rows: usize,
    message: String,
    quit: bool,
}

fn state_name(state: RunState) -> &'static str {
    match state {
        RunState::Running => "RUN",
        RunState::Break => "BRK",
        RunState::Step => "STEP",
    }
}

impl App {
    pub fn new(machine: Machine, break_on_load: bool) -> Self {
        let scheduler = Scheduler::new(machine.config());
        let speed = SpeedMeter::new(machine.config().clock_hz);
        App {
            machine,
            scheduler,
            speed,
            symbols: Symbols::new(),
            rom_path: None,
            break_on_load,
            scroll: 0,
            text_rows: DEFAULT_TEXT_ROWS,
            message: String::new(),
            quit: false,
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    /// Load firmware and its side files. On failure the machine carries on
    /// as before and the error goes to the status bar as well as the caller.
    pub fn load_rom(&mut self, path: &Path) -> Result<()> {
        if let Err(e) = self.machine.load_rom_file(path) {
            warn!(path = %path.display(), error = %e, "ROM load failed");
            self.message = format!("{}: {}", path.display(), e);
            return Err(e);
        }
        self.symbols = Symbols::load_for_rom(path).unwrap_or_else(|e| {
            warn!(error = %e, "could not read debug symbols");
            Symbols::new()
        });
        if self.break_on_load {
            self.machine.set_run_state(RunState::Break);
        }
        info!(path = %path.display(), "ROM ready");
        self.rom_path = Some(path.to_path_buf());
        self.message = format!("loaded {}", path.display());
        self.scroll = 0;
        Ok(())
    }

    pub fn handle(&mut self, event: HostEvent) {
        match event {
            HostEvent::Key(byte) => self.machine.receive_key(byte),
            HostEvent::Quit => self.quit = true,
            HostEvent::Reset => {
                if self.machine.has_firmware() {
                    self.machine.reset();
                    self.message = "reset".into();
                } else {
                    self.message = MachineError::NoFirmware.to_string();
                }
            }
            HostEvent::ToggleBreak => {
                let next = match self.machine.run_state() {
                    RunState::Running => RunState::Break,
                    _ => RunState::Running,
                };
                self.machine.set_run_state(next);
            }
            HostEvent::Run => self.machine.set_run_state(RunState::Running),
            HostEvent::Step => self.machine.set_run_state(RunState::Step),
            HostEvent::Break => self.machine.set_run_state(RunState::Break),
            HostEvent::Reload => match self.rom_path.clone() {
                Some(path) => {
                    // errors already reported in the status bar
                    let _ = self.load_rom(&path);
                }
                None => self.message = "no ROM to reload".into(),
            },
            HostEvent::ScrollUp => self.scroll = (self.scroll + SCROLL_PAGE).min(self.max_scroll()),
            HostEvent::ScrollDown => self.scroll = self.scroll.saturating_sub(SCROLL_PAGE),
            HostEvent::Message(text) => self.message = text,
        }
    }

    /// run the machine up to `now`
    pub fn tick(&mut self, now: Instant) {
        let before = self.scheduler.total_cycles();
        self.scheduler.catch_up(now, &mut self.machine);
        self.speed.record(now, self.scheduler.total_cycles() - before);
    }

    /// how many terminal rows the display has room for
    pub fn set_text_rows(&mut self, rows: usize) {
        self.text_rows = rows;
        self.scroll = self.scroll.min(self.max_scroll());
    }

    /// scrolling stops once the first line of output is at the top
    fn max_scroll(&self) -> usize {
        let lines = self
            .machine
            .acia()
            .map_or(1, |a| a.terminal().as_bytes().iter().filter(|b| **b == b'\n').count() + 1);
        lines.saturating_sub(self.text_rows)
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// one-shot: the firmware rang the bell since the last call
    pub fn take_bell(&mut self) -> bool {
        self.machine.acia_mut().map_or(false, |a| a.take_bell())
    }

    pub fn status_line(&self) -> String {
        let mut status = format!("{:6.1}%", self.speed.percent());
        if let Some(path) = &self.rom_path {
            status.push_str(&format!(" | {}", path.display()));
        }
        if self.machine.run_state() == RunState::Break {
            let pc = self.machine.pc();
            status.push_str(&format!(" | PC ${:04X}", pc));
            if let Some((label, offset)) = self.symbols.nearest_label(pc) {
                if offset == 0 {
                    status.push_str(&format!(" {}", label));
                } else {
                    status.push_str(&format!(" {}+{}", label, offset));
                }
            }
            if let Some(line) = self.symbols.source_line(pc) {
                status.push_str(" | ");
                status.push_str(line);
            }
        }
        if !self.message.is_empty() {
            status.push_str(" | ");
            status.push_str(&self.message);
        }
        status
    }

    /// the frame to draw; new terminal output snaps the view to the bottom
    pub fn view(&mut self) -> View<'_> {
        let snap = self
            .machine
            .acia_mut()
            .map_or(false, |a| a.take_scroll_to_bottom());
        if snap {
            self.scroll = 0;
        }
        let status = self.status_line();
        let state = state_name(self.machine.run_state());
        let terminal = self.machine.acia().map_or(&[][..], |a| a.terminal().as_bytes());
        View {
            terminal,
            scroll: self.scroll,
            state,
            status,
        }
    }

    pub fn shutdown(&mut self) {
        self.scheduler.restart();
        self.machine.shutdown();
    }
}
