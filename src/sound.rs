use beep::beep;
use std::error::Error;
use std::time::{Duration, Instant};

pub trait Sound {
    fn beep(&mut self) -> Result<(), Box<dyn Error>>;
    fn stop(&mut self) -> Result<(), Box<dyn Error>>;
}

const BELL_PITCH: u16 = 880; // A5
const BELL_LENGTH: Duration = Duration::from_millis(120);

/// host speaker, via the PC beeper
pub struct SimpleBeep {
    is_beeping: bool,
}

impl SimpleBeep {
    pub fn new() -> Self {
        SimpleBeep { is_beeping: false }
    }
}

impl Default for SimpleBeep {
    fn default() -> Self {
        Self::new()
    }
}

impl Sound for SimpleBeep {
    fn beep(&mut self) -> Result<(), Box<dyn Error>> {
        beep(BELL_PITCH)?;
        self.is_beeping = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn Error>> {
        if self.is_beeping {
            beep(0)?;
            self.is_beeping = false;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct Mute {}

impl Mute {
    pub fn new() -> Self {
        Mute {}
    }
}

impl Sound for Mute {
    fn beep(&mut self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}

/// Terminal bell: a BEL from the firmware starts a short tone, and the main
/// loop turns it off again once it has sounded for long enough.
pub struct Bell {
    sound: Box<dyn Sound>,
    until: Option<Instant>,
}

impl Bell {
    pub fn new(sound: Box<dyn Sound>) -> Self {
        Bell { sound, until: None }
    }

    pub fn ring(&mut self, now: Instant) -> Result<(), Box<dyn Error>> {
        if self.until.is_none() {
            self.sound.beep()?;
        }
        self.until = Some(now + BELL_LENGTH);
        Ok(())
    }

    /// silence the bell if its time is up
    pub fn update(&mut self, now: Instant) -> Result<(), Box<dyn Error>> {
        match self.until {
            Some(until) if now >= until => {
                self.until = None;
                self.sound.stop()
            }
            _ => Ok(()),
        }
    }

    pub fn is_ringing(&self) -> bool {
        self.until.is_some()
    }
}
