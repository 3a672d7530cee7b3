//! Hardware boundary traits.
//!
//! Everything below the control logic is reached through these four traits:
//! digital outputs (relay coils), digital inputs (the zero-crossing detector),
//! analog inputs (valve current sense, water thermistor) and the wall clock.
//! All methods take `&self` with interior mutability so ports can be shared
//! via `Rc` inside the single-threaded executor.
//!
//! `hal` bridges `embedded-hal` 1.0 pins onto these traits for device builds;
//! `sim` provides in-memory implementations for the host binary and tests.

use core::cell::{Cell, RefCell};

use embedded_hal::digital::{InputPin, OutputPin, PinState};
use log::warn;

/// A digital output with readback of the last commanded level.
pub trait OutputPort {
    fn set(&self, level: bool);
    fn get(&self) -> bool;
}

/// A digital input.
pub trait InputPort {
    fn is_high(&self) -> bool;
}

/// A raw-count analog input.
pub trait AnalogPort {
    fn read(&self) -> u16;
}

/// Local wall-clock time source (battery-backed RTC on device).
pub trait WallClock {
    fn now(&self) -> LocalTime;
}

// ---------------------------------------------------------------------------
// Wall-clock time
// ---------------------------------------------------------------------------

/// A broken-down local timestamp. `weekday` is 0 = Monday .. 6 = Sunday,
/// matching bit 0 of the schedule day mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl LocalTime {
    /// Seconds since local midnight, `0..86400`.
    pub fn seconds_of_day(&self) -> u32 {
        u32::from(self.hour) * 3600 + u32::from(self.minute) * 60 + u32::from(self.second)
    }
}

// ---------------------------------------------------------------------------
// embedded-hal bridges
// ---------------------------------------------------------------------------

/// Adapts an `embedded-hal` output pin to [`OutputPort`], tracking the last
/// commanded level (HAL pins are write-only).
pub struct HalOutput<P: OutputPin> {
    pin: RefCell<P>,
    level: Cell<bool>,
}

impl<P: OutputPin> HalOutput<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin: RefCell::new(pin),
            level: Cell::new(false),
        }
    }
}

impl<P: OutputPin> OutputPort for HalOutput<P> {
    fn set(&self, level: bool) {
        if self.pin.borrow_mut().set_state(PinState::from(level)).is_err() {
            warn!("GPIO write failed");
            return;
        }
        self.level.set(level);
    }

    fn get(&self) -> bool {
        self.level.get()
    }
}

/// Adapts an `embedded-hal` input pin to [`InputPort`]. A read failure is
/// reported as low.
pub struct HalInput<P: InputPin> {
    pin: RefCell<P>,
}

impl<P: InputPin> HalInput<P> {
    pub fn new(pin: P) -> Self {
        Self { pin: RefCell::new(pin) }
    }
}

impl<P: InputPin> InputPort for HalInput<P> {
    fn is_high(&self) -> bool {
        self.pin.borrow_mut().is_high().unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Simulated hardware
// ---------------------------------------------------------------------------

/// In-memory hardware for the host binary and tests. Instances own their
/// state; tests share them with the code under test through `Rc` clones, so
/// several independent rigs can coexist in one process.
pub mod sim {
    use core::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    use super::{AnalogPort, InputPort, LocalTime, OutputPort, WallClock};

    /// A pin that is both a readable output and an input.
    #[derive(Default)]
    pub struct SimPin {
        level: Cell<bool>,
    }

    impl SimPin {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl OutputPort for SimPin {
        fn set(&self, level: bool) {
            self.level.set(level);
        }

        fn get(&self) -> bool {
            self.level.get()
        }
    }

    impl InputPort for SimPin {
        fn is_high(&self) -> bool {
            self.level.get()
        }
    }

    /// An analog channel that plays back a scripted sequence of readings,
    /// then holds the resting level.
    pub struct SimAnalog {
        script: RefCell<VecDeque<u16>>,
        resting: Cell<u16>,
    }

    impl SimAnalog {
        pub fn new(resting: u16) -> Self {
            Self {
                script: RefCell::new(VecDeque::new()),
                resting: Cell::new(resting),
            }
        }

        /// Queue readings to be returned by subsequent `read()` calls.
        pub fn push_readings(&self, readings: &[u16]) {
            self.script.borrow_mut().extend(readings.iter().copied());
        }

        /// Change the level returned once the script is exhausted.
        pub fn set_resting(&self, level: u16) {
            self.resting.set(level);
        }
    }

    impl AnalogPort for SimAnalog {
        fn read(&self) -> u16 {
            self.script
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| self.resting.get())
        }
    }

    /// A settable clock. `advance` wraps the time-of-day and weekday but does
    /// not carry into the calendar date; tests that span midnight set the
    /// date explicitly.
    pub struct SimClock {
        now: Cell<LocalTime>,
    }

    impl SimClock {
        pub fn new(start: LocalTime) -> Self {
            Self { now: Cell::new(start) }
        }

        /// A plain weekday-and-time constructor for tests.
        pub fn at(weekday: u8, hour: u8, minute: u8, second: u8) -> Self {
            Self::new(LocalTime {
                year: 2025,
                month: 1,
                day: 6,
                weekday,
                hour,
                minute,
                second,
            })
        }

        pub fn set(&self, t: LocalTime) {
            self.now.set(t);
        }

        pub fn advance_secs(&self, secs: u32) {
            let mut t = self.now.get();
            let total = t.seconds_of_day() + secs;
            t.weekday = ((u32::from(t.weekday) + total / 86_400) % 7) as u8;
            let s = total % 86_400;
            t.hour = (s / 3600) as u8;
            t.minute = (s % 3600 / 60) as u8;
            t.second = (s % 60) as u8;
            self.now.set(t);
        }
    }

    impl WallClock for SimClock {
        fn now(&self) -> LocalTime {
            self.now.get()
        }
    }

    /// Host wall clock (UTC). The device build reads the battery-backed RTC
    /// instead.
    pub struct SystemClock;

    impl WallClock for SystemClock {
        fn now(&self) -> LocalTime {
            let secs = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let days = (secs / 86_400) as i64;
            let sod = (secs % 86_400) as u32;
            let (year, month, day) = civil_from_days(days);
            LocalTime {
                year,
                month,
                day,
                // 1970-01-01 was a Thursday (weekday index 3, Monday = 0)
                weekday: ((days + 3).rem_euclid(7)) as u8,
                hour: (sod / 3600) as u8,
                minute: (sod % 3600 / 60) as u8,
                second: (sod % 60) as u8,
            }
        }
    }

    /// Days-since-epoch to (year, month, day), proleptic Gregorian.
    fn civil_from_days(z: i64) -> (u16, u8, u8) {
        let z = z + 719_468;
        let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
        let doe = z - era * 146_097;
        let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
        let y = yoe + era * 400;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let d = doy - (153 * mp + 2) / 5 + 1;
        let m = if mp < 10 { mp + 3 } else { mp - 9 };
        let y = if m <= 2 { y + 1 } else { y };
        (y as u16, m as u8, d as u8)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn civil_from_days_known_dates() {
            assert_eq!(civil_from_days(0), (1970, 1, 1));
            assert_eq!(civil_from_days(19_723), (2024, 1, 1)); // leap year
            assert_eq!(civil_from_days(19_723 + 59), (2024, 2, 29));
        }

        #[test]
        fn sim_clock_advance_wraps_midnight_and_weekday() {
            let clk = SimClock::at(6, 23, 59, 30); // Sunday
            clk.advance_secs(45);
            let t = clk.now();
            assert_eq!(t.weekday, 0); // Monday
            assert_eq!((t.hour, t.minute, t.second), (0, 0, 15));
        }

        #[test]
        fn sim_analog_plays_script_then_rests() {
            let adc = SimAnalog::new(100);
            adc.push_readings(&[2000, 1500]);
            assert_eq!(adc.read(), 2000);
            assert_eq!(adc.read(), 1500);
            assert_eq!(adc.read(), 100);
            adc.set_resting(50);
            assert_eq!(adc.read(), 50);
        }
    }
}
