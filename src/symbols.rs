//! Debug symbols from the assembler's side files.
//!
//! A firmware image `foo.bin` may come with `foo.bin.lmap` (a label dump,
//! `name = $addr` per line) and `foo.bin.rpt` (a listing report, where each
//! line that emitted code starts with its line number and address). Both are
//! optional and both are parsed leniently: anything that doesn't look like a
//! symbol is skipped.
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default)]
pub struct Symbols {
    labels: HashMap<u16, String>,
    source: BTreeMap<u16, String>,
}

/// `<rom>.<ext>`, keeping the ROM's own extension
fn side_file(rom: &Path, ext: &str) -> PathBuf {
    let mut name = rom.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// `$1234`, `0x1234` or bare hex
fn parse_addr(text: &str) -> Option<u16> {
    let digits = text
        .strip_prefix('$')
        .or_else(|| text.strip_prefix("0x"))
        .unwrap_or(text);
    if digits.is_empty() || digits.len() > 4 {
        return None;
    }
    u16::from_str_radix(digits, 16).ok()
}

impl Symbols {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load whichever side files exist next to `rom`. A missing file is not
    /// an error; an unreadable one is.
    pub fn load_for_rom(rom: &Path) -> io::Result<Self> {
        let mut symbols = Symbols::new();
        if let Some(text) = read_optional(&side_file(rom, "lmap"))? {
            symbols.parse_labels(&text);
        }
        if let Some(text) = read_optional(&side_file(rom, "rpt"))? {
            symbols.parse_report(&text);
        }
        debug!(
            labels = symbols.labels.len(),
            lines = symbols.source.len(),
            "symbols loaded"
        );
        Ok(symbols)
    }

    /// `name = $addr`, optionally followed by a `;` comment
    pub fn parse_labels(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.split(';').next().unwrap_or("");
            let (name, value) = match line.split_once('=') {
                Some(pair) => pair,
                None => continue,
            };
            let name = name.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                continue;
            }
            if let Some(addr) = parse_addr(value.trim()) {
                // first label wins; later ones at the same address are aliases
                self.labels.entry(addr).or_insert_with(|| name.to_string());
            }
        }
    }

    /// `<line> <addr> <bytes...> <source>`; only the first line at an
    /// address is kept
    pub fn parse_report(&mut self, text: &str) {
        for line in text.lines() {
            let mut fields = line.split_whitespace();
            let numbered = fields.next().map_or(false, |f| f.parse::<u32>().is_ok());
            if !numbered {
                continue;
            }
            let addr = match fields.next().filter(|f| f.len() == 4).and_then(parse_addr) {
                Some(addr) => addr,
                None => continue,
            };
            self.source
                .entry(addr)
                .or_insert_with(|| line.trim().to_string());
        }
    }

    pub fn label(&self, addr: u16) -> Option<&str> {
        self.labels.get(&addr).map(String::as_str)
    }

    /// the listing line for `addr`
    pub fn source_line(&self, addr: u16) -> Option<&str> {
        self.source.get(&addr).map(String::as_str)
    }

    /// the nearest label at or below `addr`, and the offset from it
    pub fn nearest_label(&self, addr: u16) -> Option<(&str, u16)> {
        self.labels
            .iter()
            .filter(|(a, _)| **a <= addr)
            .max_by_key(|(a, _)| **a)
            .map(|(a, name)| (name.as_str(), addr - a))
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.source.is_empty()
    }
}

fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
