//! Schedule records and their wire codec.
//!
//! A schedule arrives over the configuration channel as an ASCII string of
//! 4 to 6 comma-separated decimal fields:
//!
//! ```text
//! start,end,dow,enabled[,config[,heat_mode]]
//! ```
//!
//! `start`/`end` are seconds since local midnight (inclusive window), `dow`
//! is a day-of-week bitmask with bit 0 = Monday, `enabled` is 0/1, `config`
//! is the zone-specific payload (light colour, target temperature in whole
//! degrees) and `heat_mode` only appears on heater schedules.

use core::fmt;
use core::str::FromStr;

use crate::error::ScheduleError;
use crate::ports::LocalTime;

const SECS_PER_DAY: u32 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Window start, seconds since local midnight.
    pub start_secs: u32,
    /// Window end, seconds since local midnight (inclusive).
    pub end_secs: u32,
    /// Day-of-week mask, bit 0 = Monday.
    pub days: u8,
    pub enabled: bool,
    /// Zone-specific payload byte.
    pub config: u8,
    /// Heater operating mode, heater schedules only.
    pub heat_mode: Option<u8>,
}

impl Default for Schedule {
    /// A disabled, empty schedule; what a zone holds until a valid one is
    /// written.
    fn default() -> Self {
        Self {
            start_secs: 0,
            end_secs: 0,
            days: 0,
            enabled: false,
            config: 0,
            heat_mode: None,
        }
    }
}

impl Schedule {
    /// Whether the window covers `now`. Disabled schedules never run. An
    /// `end < start` window is empty; no midnight wrap is inferred.
    pub fn is_running(&self, now: &LocalTime) -> bool {
        if !self.enabled || (self.days >> now.weekday) & 1 == 0 {
            return false;
        }
        let sod = now.seconds_of_day();
        self.start_secs <= sod && sod <= self.end_secs
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = [None::<u32>; 6];
        let mut count = 0;
        for part in s.split(',') {
            if count == fields.len() {
                return Err(ScheduleError::FieldCount(count + 1));
            }
            fields[count] = Some(
                part.trim()
                    .parse::<u32>()
                    .map_err(|_| ScheduleError::BadNumber)?,
            );
            count += 1;
        }
        if count < 4 {
            return Err(ScheduleError::FieldCount(count));
        }

        // count >= 4 guarantees the first four fields are populated
        let start_secs = fields[0].unwrap_or(0);
        let end_secs = fields[1].unwrap_or(0);
        let dow = fields[2].unwrap_or(0);
        let enabled = fields[3].unwrap_or(0);

        if start_secs >= SECS_PER_DAY {
            return Err(ScheduleError::StartOutOfRange(start_secs));
        }
        if end_secs >= SECS_PER_DAY {
            return Err(ScheduleError::EndOutOfRange(end_secs));
        }
        if dow > 0x7F {
            return Err(ScheduleError::DayMaskOutOfRange(dow));
        }

        Ok(Self {
            start_secs,
            end_secs,
            days: dow as u8,
            enabled: enabled != 0,
            config: fields[4].unwrap_or(0) as u8,
            heat_mode: fields[5].map(|m| m as u8),
        })
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{}",
            self.start_secs,
            self.end_secs,
            self.days,
            u8::from(self.enabled),
            self.config
        )?;
        if let Some(m) = self.heat_mode {
            write!(f, ",{m}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::sim::SimClock;
    use crate::ports::WallClock;

    fn at(weekday: u8, hour: u8, minute: u8) -> LocalTime {
        SimClock::at(weekday, hour, minute, 0).now()
    }

    #[test]
    fn parses_four_to_six_fields() {
        let s: Schedule = "18000,25200,127,0,5".parse().unwrap();
        assert_eq!(s.start_secs, 18_000);
        assert_eq!(s.end_secs, 25_200);
        assert_eq!(s.days, 127);
        assert!(!s.enabled);
        assert_eq!(s.config, 5);
        assert_eq!(s.heat_mode, None);

        let s: Schedule = "46800,64800,127,1,30,1".parse().unwrap();
        assert!(s.enabled);
        assert_eq!(s.config, 30);
        assert_eq!(s.heat_mode, Some(1));

        let s: Schedule = "0,100,1,1".parse().unwrap();
        assert_eq!(s.config, 0);
    }

    #[test]
    fn rejects_malformed_strings() {
        assert_eq!(
            "1,2,3".parse::<Schedule>(),
            Err(ScheduleError::FieldCount(3))
        );
        assert_eq!(
            "1,2,3,4,5,6,7".parse::<Schedule>(),
            Err(ScheduleError::FieldCount(7))
        );
        assert_eq!("a,2,3,4".parse::<Schedule>(), Err(ScheduleError::BadNumber));
        assert_eq!("".parse::<Schedule>(), Err(ScheduleError::BadNumber));
        assert_eq!(
            "86400,100,1,1".parse::<Schedule>(),
            Err(ScheduleError::StartOutOfRange(86_400))
        );
        assert_eq!(
            "100,90000,1,1".parse::<Schedule>(),
            Err(ScheduleError::EndOutOfRange(90_000))
        );
        assert_eq!(
            "100,200,128,1".parse::<Schedule>(),
            Err(ScheduleError::DayMaskOutOfRange(128))
        );
    }

    #[test]
    fn display_roundtrips() {
        for text in ["18000,25200,127,0,5", "46800,64800,127,1,30,1"] {
            let s: Schedule = text.parse().unwrap();
            assert_eq!(s.to_string(), text);
        }
    }

    #[test]
    fn window_is_inclusive_on_both_ends() {
        let s: Schedule = "18000,25200,127,1,0".parse().unwrap();
        assert!(!s.is_running(&at(0, 4, 59)));
        assert!(s.is_running(&at(0, 5, 0)));
        assert!(s.is_running(&at(0, 7, 0)));
        assert!(!s.is_running(&at(0, 7, 1)));
    }

    #[test]
    fn disabled_schedule_never_runs() {
        let s: Schedule = "0,86399,127,0,0".parse().unwrap();
        assert!(!s.is_running(&at(0, 12, 0)));
    }

    #[test]
    fn day_mask_gates_weekdays() {
        // Monday-only
        let s: Schedule = "0,86399,1,1,0".parse().unwrap();
        assert!(s.is_running(&at(0, 12, 0)));
        assert!(!s.is_running(&at(1, 12, 0)));
        assert!(!s.is_running(&at(6, 12, 0)));
        // weekend
        let s: Schedule = "0,86399,96,1,0".parse().unwrap();
        assert!(!s.is_running(&at(4, 12, 0)));
        assert!(s.is_running(&at(5, 12, 0)));
        assert!(s.is_running(&at(6, 12, 0)));
    }

    #[test]
    fn inverted_window_is_empty() {
        let s: Schedule = "50000,10000,127,1,0".parse().unwrap();
        assert!(!s.is_running(&at(2, 0, 0)));
        assert!(!s.is_running(&at(2, 12, 0)));
        assert!(!s.is_running(&at(2, 23, 59)));
    }
}
