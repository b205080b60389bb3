//! Elapsed-time tracking on top of a [`Clock`].

use crate::Clock;

/// A resettable stopwatch.
///
/// The timer only stores its start stamp; every query goes through the clock
/// it is given, so one clock can back any number of timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timer {
    start_ms: u32,
}

impl Timer {
    /// Start a timer at the clock's current time.
    pub fn started<C: Clock + ?Sized>(clock: &C) -> Self {
        Timer { start_ms: clock.millis() }
    }

    /// Milliseconds since the timer was started or last reset.
    pub fn elapsed<C: Clock + ?Sized>(&self, clock: &C) -> u32 {
        clock.millis().wrapping_sub(self.start_ms)
    }

    /// Restart the timer from the clock's current time.
    pub fn reset<C: Clock + ?Sized>(&mut self, clock: &C) {
        self.start_ms = clock.millis();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct ManualClock(Cell<u32>);

    impl Clock for ManualClock {
        fn millis(&self) -> u32 {
            self.0.get()
        }

        fn delay_ms(&self, ms: u32) {
            self.0.set(self.0.get().wrapping_add(ms));
        }
    }

    #[test]
    fn test_elapsed_and_reset() {
        let clock = ManualClock(Cell::new(1_000));
        let mut timer = Timer::started(&clock);
        assert_eq!(timer.elapsed(&clock), 0);

        clock.delay_ms(250);
        assert_eq!(timer.elapsed(&clock), 250);

        timer.reset(&clock);
        assert_eq!(timer.elapsed(&clock), 0);
    }

    #[test]
    fn test_elapsed_across_wraparound() {
        let clock = ManualClock(Cell::new(u32::MAX - 9));
        let timer = Timer::started(&clock);
        clock.delay_ms(20);
        assert_eq!(timer.elapsed(&clock), 20);
    }
}
