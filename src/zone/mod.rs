//! Control zones.
//!
//! A zone is one controllable subsystem (pool light, garden light, water
//! feature, heater) driven by the same attribute set: two schedules, a mode,
//! a manual configuration and a published status. The mode and schedules
//! determine a *desired state* through a pure evaluator; the zone loops
//! re-evaluate every poll tick and actuate only when the evaluation result
//! changes, so a schedule window opening or closing fires exactly once and
//! identical results are never re-applied.

pub mod heat;
pub mod runner;

use core::cell::{Cell, RefCell};

use log::{error, info};

use crate::ports::LocalTime;
use crate::schedule::Schedule;
use crate::store::{Attribute, Value};

// ---------------------------------------------------------------------------
// Modes and statuses
// ---------------------------------------------------------------------------

/// Zone operating mode, one byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ManualOff,
    ManualOn,
    Auto,
}

impl Mode {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Self::ManualOff),
            0x01 => Some(Self::ManualOn),
            0x02 => Some(Self::Auto),
            _ => None,
        }
    }
}

/// Zone status byte published back over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    ManualOff = 0x00,
    ManualOn = 0x01,
    ScheduleOff = 0x02,
    Schedule1On = 0x03,
    Schedule2On = 0x04,
    Transitioning = 0xFF,
}

impl Status {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// What a zone's output should be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Desired {
    Off,
    /// On, with the zone-specific payload (light colour code; unused by the
    /// relay-only zones).
    On { config: u8 },
}

/// The full evaluator result: output plus the status to publish once the
/// output has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub desired: Desired,
    pub status: Status,
}

/// Pure mode/schedule evaluation. Schedule 1 wins when both windows cover
/// `now`.
pub fn evaluate(
    mode: Mode,
    manual_config: u8,
    sch1: &Schedule,
    sch2: &Schedule,
    now: &LocalTime,
) -> Evaluation {
    match mode {
        Mode::ManualOff => Evaluation {
            desired: Desired::Off,
            status: Status::ManualOff,
        },
        Mode::ManualOn => Evaluation {
            desired: Desired::On { config: manual_config },
            status: Status::ManualOn,
        },
        Mode::Auto => {
            if sch1.is_running(now) {
                Evaluation {
                    desired: Desired::On { config: sch1.config },
                    status: Status::Schedule1On,
                }
            } else if sch2.is_running(now) {
                Evaluation {
                    desired: Desired::On { config: sch2.config },
                    status: Status::Schedule2On,
                }
            } else {
                Evaluation {
                    desired: Desired::Off,
                    status: Status::ScheduleOff,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Schedule caching
// ---------------------------------------------------------------------------

/// Last-good-value cache in front of a schedule attribute. Re-parses only
/// when the raw bytes change; a malformed write is logged once and the
/// previous schedule stays in force.
pub(crate) struct ScheduleSlot {
    raw: RefCell<Value>,
    parsed: Cell<Schedule>,
}

impl ScheduleSlot {
    pub fn new() -> Self {
        Self {
            raw: RefCell::new(Value::new()),
            parsed: Cell::new(Schedule::default()),
        }
    }

    pub fn current(&self, attribute: &Attribute) -> Schedule {
        let raw = attribute.read();
        if *self.raw.borrow() != raw {
            match core::str::from_utf8(&raw)
                .map_err(|_| crate::error::ScheduleError::BadNumber)
                .and_then(|s| s.trim().parse::<Schedule>())
            {
                Ok(schedule) => {
                    info!("{} updated: {schedule}", attribute.name());
                    self.parsed.set(schedule);
                }
                Err(e) => {
                    error!("{}: {e}; keeping previous schedule", attribute.name());
                }
            }
            *self.raw.borrow_mut() = raw;
        }
        self.parsed.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::sim::SimClock;
    use crate::ports::WallClock;

    fn sch(text: &str) -> Schedule {
        text.parse().unwrap()
    }

    fn noon_monday() -> LocalTime {
        SimClock::at(0, 12, 0, 0).now()
    }

    #[test]
    fn manual_modes_ignore_schedules() {
        let running = sch("0,86399,127,1,5");
        let now = noon_monday();
        let e = evaluate(Mode::ManualOff, 3, &running, &running, &now);
        assert_eq!(e.desired, Desired::Off);
        assert_eq!(e.status, Status::ManualOff);

        let e = evaluate(Mode::ManualOn, 3, &running, &running, &now);
        assert_eq!(e.desired, Desired::On { config: 3 });
        assert_eq!(e.status, Status::ManualOn);
    }

    #[test]
    fn auto_prefers_schedule_one() {
        let s1 = sch("0,86399,127,1,5");
        let s2 = sch("0,86399,127,1,7");
        let e = evaluate(Mode::Auto, 0, &s1, &s2, &noon_monday());
        assert_eq!(e.desired, Desired::On { config: 5 });
        assert_eq!(e.status, Status::Schedule1On);
    }

    #[test]
    fn auto_falls_through_to_schedule_two() {
        let s1 = sch("0,100,127,1,5");
        let s2 = sch("0,86399,127,1,7");
        let e = evaluate(Mode::Auto, 0, &s1, &s2, &noon_monday());
        assert_eq!(e.desired, Desired::On { config: 7 });
        assert_eq!(e.status, Status::Schedule2On);
    }

    #[test]
    fn auto_with_no_running_window_is_off() {
        let s1 = sch("0,100,127,1,5");
        let s2 = sch("200,300,127,1,7");
        let e = evaluate(Mode::Auto, 0, &s1, &s2, &noon_monday());
        assert_eq!(e.desired, Desired::Off);
        assert_eq!(e.status, Status::ScheduleOff);
    }

    #[test]
    fn evaluation_changes_exactly_at_window_edges() {
        let s1 = sch("18000,25200,127,1,5");
        let s2 = Schedule::default();
        let clk = SimClock::at(0, 4, 59, 59);
        let before = evaluate(Mode::Auto, 0, &s1, &s2, &clk.now());
        clk.advance_secs(1);
        let at_start = evaluate(Mode::Auto, 0, &s1, &s2, &clk.now());
        assert_ne!(before, at_start);
        assert_eq!(at_start.status, Status::Schedule1On);
    }

    #[test]
    fn schedule_slot_keeps_last_good_value() {
        let attr = Attribute::new("t.schedule1", b"100,200,127,1,5");
        let slot = ScheduleSlot::new();
        let first = slot.current(&attr);
        assert!(first.enabled);
        assert_eq!(first.config, 5);

        attr.write(b"not,a,schedule,at,all").unwrap();
        assert_eq!(slot.current(&attr), first);

        attr.write(b"300,400,127,1,9").unwrap();
        assert_eq!(slot.current(&attr).config, 9);
    }
}
