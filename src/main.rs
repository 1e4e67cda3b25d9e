use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use db6502::config::MachineConfig;
use db6502::display::{Display, TermDisplay};
use db6502::frontend::App;
use db6502::input::{Input, TermInput};
use db6502::machine::Machine;
use db6502::sound::{Bell, Mute, SimpleBeep, Sound};

/// redraw (and take input) at most this often, ~60Hz
const FRAME_INTERVAL: Duration = Duration::from_millis(17);

/// host events handled per frame; the rest wait for the next one
const MAX_EVENTS_PER_FRAME: usize = 64;

/// yield between scheduler calls
const IDLE_SLEEP: Duration = Duration::from_micros(250);

/// DB6502 computer emulator: 65C02, 32K RAM, 32K ROM, 65C51 serial terminal
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// 32K firmware image
    #[arg(long)]
    rom: Option<PathBuf>,

    /// start halted in the debugger
    #[arg(long)]
    brk: bool,

    /// text file sent by Ctrl+V
    #[arg(long)]
    paste: Option<PathBuf>,

    /// write a trace log here (filter with RUST_LOG)
    #[arg(long)]
    log: Option<PathBuf>,

    /// don't ring the host bell
    #[arg(long)]
    mute: bool,
}

/// the TUI owns stdout, so logs only go to a file and only when asked for
fn init_logging(path: Option<&PathBuf>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => return Ok(()),
    };
    let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let machine = Machine::new(MachineConfig::default()).context("building machine")?;
    let paste = machine.paste_queue();
    let mut app = App::new(machine, args.brk);
    if let Some(rom) = &args.rom {
        // a bad ROM still opens the emulator, with the error in the status bar
        if let Err(e) = app.load_rom(rom) {
            error!(error = %e, "initial ROM load failed");
        }
    }

    let sound: Box<dyn Sound> = if args.mute {
        Box::new(Mute::new())
    } else {
        Box::new(SimpleBeep::new())
    };
    let mut bell = Bell::new(sound);

    let mut display = TermDisplay::new().context("initialising terminal display")?;
    let mut input = TermInput::spawn(args.paste.clone(), paste).context("starting input thread")?;

    let mut last_frame: Option<Instant> = None;
    while !app.should_quit() {
        let now = Instant::now();
        app.tick(now);

        if last_frame.map_or(true, |t| now.duration_since(t) >= FRAME_INTERVAL) {
            app.set_text_rows(display.text_rows());
            for event in input.drain(MAX_EVENTS_PER_FRAME) {
                app.handle(event);
            }
            if app.take_bell() {
                if let Err(e) = bell.ring(now) {
                    error!(error = %e, "bell failed");
                }
            }
            if let Err(e) = bell.update(now) {
                error!(error = %e, "bell failed");
            }
            app.machine_mut().render();
            display.draw(&app.view())?;
            last_frame = Some(now);
        }

        spin_sleep::sleep(IDLE_SLEEP);
    }

    info!("shutting down");
    app.shutdown();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log.as_ref())?;
    info!(?args, "starting");
    run(&args)
}
