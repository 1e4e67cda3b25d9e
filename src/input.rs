use crate::paste::PasteQueue;
use crossterm::event::{poll, read, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// how long the input thread blocks on the terminal before checking whether
/// it should stop
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// what the host wants the emulator to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// a byte for the ACIA receiver
    Key(u8),
    Quit,
    Reset,
    ToggleBreak,
    Run,
    Step,
    Break,
    Reload,
    ScrollUp,
    ScrollDown,
    /// something to show in the status bar
    Message(String),
}

/// Translate a terminal key press. Control chords drive the emulator;
/// everything else is serial input.
pub fn map_key(key: KeyEvent) -> Option<HostEvent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('q') => Some(HostEvent::Quit),
            KeyCode::Char('r') => Some(HostEvent::Reset),
            KeyCode::Char('d') => Some(HostEvent::ToggleBreak),
            KeyCode::Char('l') => Some(HostEvent::Reload),
            // ^C and friends go to the firmware as control codes
            KeyCode::Char(c) if c.is_ascii_lowercase() => Some(HostEvent::Key(c as u8 - b'a' + 1)),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Char(c) if (' '..='~').contains(&c) => Some(HostEvent::Key(c as u8)),
        KeyCode::Enter => Some(HostEvent::Key(b'\r')),
        KeyCode::Backspace => Some(HostEvent::Key(0x08)),
        KeyCode::Esc => Some(HostEvent::Key(0x1b)),
        KeyCode::Tab => Some(HostEvent::Key(b'\t')),
        KeyCode::F(5) => Some(HostEvent::Run),
        KeyCode::F(11) => Some(HostEvent::Step),
        KeyCode::F(12) => Some(HostEvent::Break),
        KeyCode::PageUp => Some(HostEvent::ScrollUp),
        KeyCode::PageDown => Some(HostEvent::ScrollDown),
        _ => None,
    }
}

/// Ctrl+V, which the input thread answers itself by queueing the paste file
pub fn is_paste_chord(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('v')
}

/// reads host events
pub trait Input {
    /// take up to `max` pending events without blocking
    fn drain(&mut self, max: usize) -> Vec<HostEvent>;
}

/// Terminal input on its own thread.
///
/// The thread owns the terminal's event stream and forwards mapped events
/// over a channel. Paste requests are handled on the thread too: the file is
/// read there and its text goes straight into the shared paste queue.
pub struct TermInput {
    events: Receiver<HostEvent>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TermInput {
    pub fn spawn(paste_file: Option<PathBuf>, paste: PasteQueue) -> Result<TermInput, io::Error> {
        terminal::enable_raw_mode()?;
        let (tx, events) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("input".into())
            .spawn(move || input_loop(tx, thread_stop, paste_file, paste))?;
        Ok(TermInput {
            events,
            stop,
            handle: Some(handle),
        })
    }
}

fn input_loop(
    tx: Sender<HostEvent>,
    stop: Arc<AtomicBool>,
    paste_file: Option<PathBuf>,
    paste: PasteQueue,
) {
    while !stop.load(Ordering::Relaxed) {
        let key = match poll(POLL_INTERVAL).and_then(|ready| if ready { read().map(Some) } else { Ok(None) }) {
            Ok(Some(Event::Key(key))) => key,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "terminal input failed");
                let _ = tx.send(HostEvent::Quit);
                return;
            }
        };
        if is_paste_chord(&key) {
            if tx.send(paste_from(paste_file.as_ref(), &paste)).is_err() {
                return;
            }
            continue;
        }
        let event = match map_key(key) {
            Some(event) => event,
            None => {
                debug!(?key, "unmapped key");
                continue;
            }
        };
        if tx.send(event).is_err() {
            return;
        }
    }
}

fn paste_from(path: Option<&PathBuf>, paste: &PasteQueue) -> HostEvent {
    let path = match path {
        Some(path) => path,
        None => return HostEvent::Message("no paste file, use --paste <file>".into()),
    };
    match fs::read_to_string(path) {
        Ok(text) => {
            paste.paste(&text);
            HostEvent::Message(format!("pasting {} bytes from {}", text.len(), path.display()))
        }
        Err(e) => HostEvent::Message(format!("can't read {}: {}", path.display(), e)),
    }
}

impl Drop for TermInput {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let _ = terminal::disable_raw_mode();
    }
}

impl Input for TermInput {
    fn drain(&mut self, max: usize) -> Vec<HostEvent> {
        self.events.try_iter().take(max).collect()
    }
}

/// dummy Input implementation for testing
pub struct DummyInput {
    events: VecDeque<HostEvent>,
}

impl DummyInput {
    pub fn new(events: &[HostEvent]) -> Self {
        DummyInput {
            events: events.iter().cloned().collect(),
        }
    }
}

impl Input for DummyInput {
    fn drain(&mut self, max: usize) -> Vec<HostEvent> {
        let n = max.min(self.events.len());
        self.events.drain(..n).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_printable_keys() {
        assert_eq!(map_key(key(KeyCode::Char('a'))), Some(HostEvent::Key(b'a')));
        assert_eq!(map_key(key(KeyCode::Char('~'))), Some(HostEvent::Key(b'~')));
        assert_eq!(map_key(key(KeyCode::Char('é'))), None);
    }

    #[test]
    fn test_special_keys() {
        assert_eq!(map_key(key(KeyCode::Enter)), Some(HostEvent::Key(b'\r')));
        assert_eq!(map_key(key(KeyCode::Backspace)), Some(HostEvent::Key(0x08)));
        assert_eq!(map_key(key(KeyCode::Esc)), Some(HostEvent::Key(0x1b)));
    }

    #[test]
    fn test_control_chords() {
        assert_eq!(map_key(ctrl('q')), Some(HostEvent::Quit));
        assert_eq!(map_key(ctrl('r')), Some(HostEvent::Reset));
        assert_eq!(map_key(ctrl('d')), Some(HostEvent::ToggleBreak));
        assert_eq!(map_key(ctrl('c')), Some(HostEvent::Key(0x03)));
    }

    #[test]
    fn test_debugger_keys() {
        assert_eq!(map_key(key(KeyCode::F(5))), Some(HostEvent::Run));
        assert_eq!(map_key(key(KeyCode::F(11))), Some(HostEvent::Step));
        assert_eq!(map_key(key(KeyCode::F(12))), Some(HostEvent::Break));
    }

    #[test]
    fn test_paste_chord() {
        assert!(is_paste_chord(&ctrl('v')));
        assert!(!is_paste_chord(&key(KeyCode::Char('v'))));
        assert!(!is_paste_chord(&ctrl('c')));
    }

    #[test]
    fn test_paste_without_file() {
        let q = PasteQueue::new();
        assert!(matches!(paste_from(None, &q), HostEvent::Message(_)));
        assert!(q.is_empty());
    }

    #[test]
    fn test_dummy_drain_is_bounded() {
        let mut input = DummyInput::new(&[HostEvent::Key(1), HostEvent::Key(2), HostEvent::Key(3)]);
        assert_eq!(input.drain(2), vec![HostEvent::Key(1), HostEvent::Key(2)]);
        assert_eq!(input.drain(2), vec![HostEvent::Key(3)]);
        assert!(input.drain(2).is_empty());
    }
}
