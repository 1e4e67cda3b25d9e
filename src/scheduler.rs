//! Real-time pacing.
//!
//! The host loop calls `catch_up` as often as it likes. Each call works out how
//! much wall-clock time has passed since the last one and runs enough
//! fixed-size batches of emulated cycles to cover it, so over time the
//! machine runs at its nominal clock no matter how irregular the host is.
use crate::config::MachineConfig;
use std::time::{Duration, Instant};

/// Whatever runs the emulated machine for one batch.
pub trait BatchRunner {
    fn run_batch(&mut self, cycles: u32, elapsed: Duration);
}

pub struct Scheduler {
    last: Option<Instant>,
    batch: Duration,
    batch_cycles: u32,
    max_elapsed: Duration,
    total_cycles: u64,
}

impl Scheduler {
    pub fn new(config: &MachineConfig) -> Self {
        Scheduler {
            last: None,
            batch: config.batch,
            batch_cycles: config.batch_cycles(),
            max_elapsed: config.max_catch_up,
            total_cycles: 0,
        }
    }

    /// Run the batches owed since the previous call; returns how many ran.
    ///
    /// The first call only starts the clock. After that, elapsed time is
    /// clamped to the catch-up cap (a stall in the host doesn't turn into a
    /// burst of emulated seconds) and at least one batch always runs, so the
    /// machine makes progress even if called faster than the batch duration.
    pub fn catch_up(&mut self, now: Instant, target: &mut impl BatchRunner) -> usize {
        let last = match self.last {
            Some(last) => last,
            None => {
                self.last = Some(now);
                return 0;
            }
        };
        let elapsed = now.saturating_duration_since(last);
        if elapsed.is_zero() {
            return 0;
        }
        let elapsed = elapsed.min(self.max_elapsed);
        let batches = (elapsed.as_nanos() / self.batch.as_nanos().max(1)).max(1) as usize;
        for _ in 0..batches {
            target.run_batch(self.batch_cycles, self.batch);
            self.total_cycles += u64::from(self.batch_cycles);
        }
        self.last = Some(now);
        batches
    }

    /// forget the reference point, e.g. after the emulator was paused
    pub fn restart(&mut self) {
        self.last = None;
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }
}

/// Emulated speed as a percentage of the nominal clock, sampled about once a
/// second.
pub struct SpeedMeter {
    clock_hz: u64,
    window_start: Option<Instant>,
    window_cycles: u64,
    percent: f64,
}

impl SpeedMeter {
    pub fn new(clock_hz: u32) -> Self {
        SpeedMeter {
            clock_hz: u64::from(clock_hz),
            window_start: None,
            window_cycles: 0,
            percent: 0.0,
        }
    }

    pub fn record(&mut self, now: Instant, cycles: u64) {
        let start = *self.window_start.get_or_insert(now);
        self.window_cycles += cycles;
        let span = now.saturating_duration_since(start);
        if span >= Duration::from_secs(1) {
            let expected = self.clock_hz as f64 * span.as_secs_f64();
            self.percent = 100.0 * self.window_cycles as f64 / expected;
            self.window_start = Some(now);
            self.window_cycles = 0;
        }
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        batches: usize,
        cycles: u64,
    }

    impl BatchRunner for Counter {
        fn run_batch(&mut self, cycles: u32, elapsed: Duration) {
            assert_eq!(elapsed, Duration::from_micros(100));
            self.batches += 1;
            self.cycles += u64::from(cycles);
        }
    }

    fn sched() -> Scheduler {
        Scheduler::new(&MachineConfig::default())
    }

    #[test]
    fn test_first_call_runs_nothing() {
        let mut s = sched();
        let mut c = Counter::default();
        assert_eq!(s.catch_up(Instant::now(), &mut c), 0);
        assert_eq!(c.batches, 0);
    }

    #[test]
    fn test_zero_elapsed_runs_nothing() {
        let mut s = sched();
        let mut c = Counter::default();
        let t = Instant::now();
        s.catch_up(t, &mut c);
        assert_eq!(s.catch_up(t, &mut c), 0);
    }

    #[test]
    fn test_batches_cover_elapsed() {
        let mut s = sched();
        let mut c = Counter::default();
        let t = Instant::now();
        s.catch_up(t, &mut c);
        assert_eq!(s.catch_up(t + Duration::from_millis(1), &mut c), 10);
        assert_eq!(c.cycles, 4000);
        assert_eq!(s.total_cycles(), 4000);
    }

    #[test]
    fn test_clamped_to_cap() {
        let mut s = sched();
        let mut c = Counter::default();
        let t = Instant::now();
        s.catch_up(t, &mut c);
        // 250ms late, capped at 50ms worth
        assert_eq!(s.catch_up(t + Duration::from_millis(250), &mut c), 500);
    }

    #[test]
    fn test_at_least_one_batch() {
        let mut s = sched();
        let mut c = Counter::default();
        let t = Instant::now();
        s.catch_up(t, &mut c);
        assert_eq!(s.catch_up(t + Duration::from_micros(30), &mut c), 1);
        assert_eq!(c.cycles, 400);
    }

    #[test]
    fn test_restart() {
        let mut s = sched();
        let mut c = Counter::default();
        let t = Instant::now();
        s.catch_up(t, &mut c);
        s.restart();
        assert_eq!(s.catch_up(t + Duration::from_secs(5), &mut c), 0);
    }

    #[test]
    fn test_speed_meter() {
        let mut m = SpeedMeter::new(4_000_000);
        let t = Instant::now();
        m.record(t, 0);
        m.record(t + Duration::from_secs(1), 2_000_000);
        assert!((m.percent() - 50.0).abs() < 0.01);
    }
}
