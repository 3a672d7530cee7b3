//! Property tests for the pure core: temperature rounding and the schedule
//! codec.
//!
//! Host only — proptest does not build for the device target.

#![cfg(not(target_os = "espidf"))]

use aquadeck::heater::round_to_step;
use aquadeck::ports::LocalTime;
use aquadeck::schedule::Schedule;
use proptest::prelude::*;

fn arb_schedule() -> impl Strategy<Value = Schedule> {
    (
        0u32..86_400,
        0u32..86_400,
        0u8..=127,
        any::<bool>(),
        any::<u8>(),
        proptest::option::of(0u8..=3),
    )
        .prop_map(|(start_secs, end_secs, days, enabled, config, heat_mode)| Schedule {
            start_secs,
            end_secs,
            days,
            enabled,
            config,
            heat_mode,
        })
}

fn arb_time() -> impl Strategy<Value = LocalTime> {
    (0u8..7, 0u8..24, 0u8..60, 0u8..60).prop_map(|(weekday, hour, minute, second)| LocalTime {
        year: 2025,
        month: 1,
        day: 6,
        weekday,
        hour,
        minute,
        second,
    })
}

proptest! {
    /// Rounding always lands on a multiple of the step, never moves the
    /// value by more than half a step, and is idempotent.
    #[test]
    fn rounding_is_a_projection(value in -100_000i32..100_000) {
        let r = round_to_step(value, 50);
        prop_assert_eq!(r % 50, 0);
        prop_assert!((r - value).abs() <= 25, "{} -> {}", value, r);
        prop_assert_eq!(round_to_step(r, 50), r);
    }

    /// Rendering a schedule and parsing it back is lossless.
    #[test]
    fn schedule_display_parse_roundtrip(s in arb_schedule()) {
        let text = s.to_string();
        prop_assert_eq!(text.parse::<Schedule>(), Ok(s));
    }

    /// The parser returns an error for junk instead of panicking.
    #[test]
    fn schedule_parse_never_panics(text in "\\PC*") {
        let _ = text.parse::<Schedule>();
    }

    /// Disabled schedules never run, no matter the window or the clock.
    #[test]
    fn disabled_schedule_never_runs(s in arb_schedule(), now in arb_time()) {
        let s = Schedule { enabled: false, ..s };
        prop_assert!(!s.is_running(&now));
    }

    /// A running schedule is enabled, covers the weekday and brackets the
    /// time of day.
    #[test]
    fn running_implies_enabled_day_and_window(s in arb_schedule(), now in arb_time()) {
        if s.is_running(&now) {
            prop_assert!(s.enabled);
            prop_assert_eq!((s.days >> now.weekday) & 1, 1);
            let sod = now.seconds_of_day();
            prop_assert!(s.start_secs <= sod && sod <= s.end_secs);
        }
    }
}
