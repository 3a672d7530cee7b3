//! System configuration parameters
//!
//! All tunable parameters for the AquaDeck controller. Production values live
//! in the `Default` impls; tests construct configs with millisecond-scale
//! timings so async flows complete quickly under the test executor.

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Zone loops ---
    /// Attribute poll / evaluation interval for every zone loop (ms)
    pub zone_poll_ms: u32,
    /// Spa-refill countdown granularity (ms per cancellation check)
    pub spa_refill_check_ms: u32,

    // --- Relays ---
    /// Pulse-sustained relay toggle period (ms)
    pub pulse_period_ms: u32,
    /// Zero-crossing edge wait cap (ms); expiry is logged, never fatal
    pub zcd_timeout_ms: u32,
    /// Delay between a detected edge and energising the relay, compensating
    /// for coil pull-in time so contacts close near the next zero crossing (ms)
    pub zcd_switch_delay_ms: u32,

    // --- Telemetry ---
    /// Water-temperature check interval (ms)
    pub telemetry_poll_ms: u32,
    /// Hold-off after publishing a changed water temperature (ms)
    pub telemetry_hold_ms: u32,

    // --- Pump sequencing ---
    /// Settle time after starting the filtration pump (ms)
    pub pump_on_settle_ms: u32,
    /// Settle time after stopping the filtration pump (ms)
    pub pump_off_settle_ms: u32,

    pub valves: ValveTuning,
    pub heater: HeaterTuning,
}

/// Motorised valve transition tuning.
///
/// Valve actuators draw supply current while their motors run; the shared
/// current-sense ADC channel therefore reports how many motors are moving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValveTuning {
    /// Poll period while waiting for a concurrent transition to finish (ms)
    pub busy_poll_ms: u32,
    /// Poll period while waiting for motor current to appear (ms)
    pub start_poll_ms: u32,
    /// Polls before giving up on detecting motor start
    pub start_retries: u32,
    /// Poll period while waiting for motor current to vanish (ms)
    pub stop_poll_ms: u32,
    /// Polls before giving up on detecting motor stop
    pub stop_retries: u32,
    pub thresholds: AdcThresholds,
}

/// Current-sense ADC classification thresholds (raw counts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdcThresholds {
    /// Below this, all motors are considered stopped
    pub stopped: u16,
    /// Above this, more current than one motor should draw
    pub one_moving: u16,
    /// Above this, more current than two motors should draw
    pub two_moving: u16,
    /// Above this, hard over-current (logged as an error)
    pub max: u16,
}

/// Heater thermostat tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaterTuning {
    /// Thermostat evaluation period (ms)
    pub loop_period_ms: u32,
    /// Minimum dwell after the element turns off (ms)
    pub off_check_period_ms: u32,
    /// Minimum dwell after the element turns on (ms)
    pub minimum_on_ms: u32,
    /// Overshoot allowance above target before forcing off (centi-deg C)
    pub upper_tolerance_centi: i32,
    /// Temperature rounding step (centi-deg C); targets must be multiples
    pub round_step: i32,
    /// ADC samples averaged per temperature reading
    pub sample_count: u32,
    /// Delay between consecutive ADC samples (ms)
    pub sample_period_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Zone loops
            zone_poll_ms: 100,
            spa_refill_check_ms: 1000,

            // Relays
            pulse_period_ms: 10,
            zcd_timeout_ms: 50, // > two mains cycles at 50 Hz
            zcd_switch_delay_ms: 5,

            // Telemetry
            telemetry_poll_ms: 1_000,
            telemetry_hold_ms: 5_000,

            // Pump sequencing
            pump_on_settle_ms: 10_000,
            pump_off_settle_ms: 3_000,

            valves: ValveTuning::default(),
            heater: HeaterTuning::default(),
        }
    }
}

impl Default for ValveTuning {
    fn default() -> Self {
        Self {
            busy_poll_ms: 5_000,
            start_poll_ms: 1_000,
            start_retries: 3,
            stop_poll_ms: 1_000,
            stop_retries: 60, // valves take up to ~40 s to traverse
            thresholds: AdcThresholds::default(),
        }
    }
}

impl Default for AdcThresholds {
    fn default() -> Self {
        Self {
            stopped: 800,
            one_moving: 1400,
            two_moving: 2600,
            max: 3000,
        }
    }
}

impl Default for HeaterTuning {
    fn default() -> Self {
        Self {
            loop_period_ms: 1_000,
            off_check_period_ms: 1_800_000, // 30 min
            minimum_on_ms: 300_000,         // 5 min
            upper_tolerance_centi: 100,
            round_step: 50,
            sample_count: 100,
            sample_period_ms: 10,
        }
    }
}
