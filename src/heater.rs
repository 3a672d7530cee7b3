//! Heater thermostat.
//!
//! A bang-bang controller over the pulse-sustained heater relay. The element
//! turns on below target and off above target plus the upper tolerance, with
//! long dwell holds after each switch so a gas heater or heat pump is never
//! short-cycled: after turning on the loop holds for the minimum-on time,
//! after turning off it holds for the off-check period. `disable` is the one
//! immediate path — it drops the element without waiting out a dwell.
//!
//! Temperatures are centi-degrees Celsius throughout. Readings are an
//! average of many ADC samples, rounded symmetrically to the configured
//! step; targets must be multiples of that step.

use core::cell::Cell;
use core::time::Duration;
use std::rc::Rc;

use async_io_mini::Timer;
use log::{debug, warn};

use crate::config::HeaterTuning;
use crate::error::{Error, Result};
use crate::relays::Relay;

/// Round to the nearest multiple of `step`, away from zero on ties,
/// symmetrically for negative values:
///
/// ```text
///   1100 <-  1050,  1051,  1099
///   1000 <-  1049,  1048,  1001
///  -1100 <- -1050, -1051, -1099
///  -1000 <- -1049, -1048, -1001
/// ```
pub fn round_to_step(value: i32, step: i32) -> i32 {
    if value >= 0 {
        (value + step / 2) / step * step
    } else {
        (value - step / 2) / step * step
    }
}

pub struct HeaterController {
    relay: Relay,
    read_temperature: Rc<dyn Fn() -> i32>,
    tuning: HeaterTuning,
    target_centi: Cell<i32>,
    enabled: Cell<bool>,
}

impl HeaterController {
    /// `read_temperature` returns one raw centi-degree sample; averaging and
    /// rounding happen here.
    pub fn new(relay: Relay, read_temperature: Rc<dyn Fn() -> i32>, tuning: HeaterTuning) -> Self {
        Self {
            relay,
            read_temperature,
            tuning,
            target_centi: Cell::new(0),
            enabled: Cell::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn is_running(&self) -> bool {
        self.relay.is_on()
    }

    pub fn target(&self) -> i32 {
        self.target_centi.get()
    }

    /// Enable the thermostat and, when already below target, start a partial
    /// heating cycle right away rather than waiting for the loop.
    pub async fn enable(&self) {
        debug!("heater enabled");
        self.enabled.set(true);
        let temperature = self.rounded_temperature().await;
        if temperature < self.target_centi.get() && self.turn_on_if_possible() {
            warn!("heater on for partial cycle");
        }
    }

    /// Disable and drop the element immediately, even mid-dwell.
    pub fn disable(&self) {
        self.enabled.set(false);
        debug!("heater disabled");
        if self.turn_off_if_possible() {
            warn!("heater off");
        }
    }

    /// Set the target temperature. Rejects values that are not multiples of
    /// the rounding step. When enabled, the new target is enforced
    /// immediately instead of waiting out the current dwell.
    pub async fn set_target(&self, target_centi: i32) -> Result<()> {
        if target_centi % self.tuning.round_step != 0 {
            return Err(Error::InvalidTarget {
                target_centi,
                step: self.tuning.round_step,
            });
        }
        self.target_centi.set(target_centi);
        debug!("heater target set to {} centi-deg", target_centi);
        if self.enabled.get() {
            let temperature = self.rounded_temperature().await;
            if temperature < target_centi {
                if self.turn_on_if_possible() {
                    warn!("heater on for target change");
                }
            } else if temperature > target_centi + self.tuning.upper_tolerance_centi
                && self.turn_off_if_possible()
            {
                warn!("heater off for target change");
            }
        }
        Ok(())
    }

    /// The thermostat loop. Runs forever; switching decisions hold for the
    /// dwell times, disable takes effect at the next loop tick (the relay
    /// itself is already off by then via [`Self::disable`]).
    pub async fn run(&self) {
        let period = Duration::from_millis(u64::from(self.tuning.loop_period_ms));
        let mut was_enabled = true;
        loop {
            if self.enabled.get() {
                if !was_enabled {
                    was_enabled = true;
                    debug!("heater loop resumed");
                }
                Timer::after(period).await;
                let temperature = self.rounded_temperature().await;
                debug!("water temperature {} centi-deg", temperature);
                if temperature < self.target_centi.get() {
                    if self.turn_on_if_possible() {
                        debug!("heater on, holding {} ms", self.tuning.minimum_on_ms);
                        Timer::after(Duration::from_millis(u64::from(self.tuning.minimum_on_ms)))
                            .await;
                    }
                } else if temperature > self.target_centi.get() + self.tuning.upper_tolerance_centi
                    && self.turn_off_if_possible()
                {
                    debug!("heater off, holding {} ms", self.tuning.off_check_period_ms);
                    Timer::after(Duration::from_millis(u64::from(
                        self.tuning.off_check_period_ms,
                    )))
                    .await;
                }
            } else if was_enabled {
                was_enabled = false;
                debug!("heater loop paused");
                if self.turn_off_if_possible() {
                    warn!("heater off");
                }
            }
            Timer::after(period).await;
        }
    }

    /// Average many samples and round to the configured step.
    pub async fn rounded_temperature(&self) -> i32 {
        let sample_gap = Duration::from_millis(u64::from(self.tuning.sample_period_ms));
        let mut sum = 0i32;
        for _ in 0..self.tuning.sample_count {
            sum += (self.read_temperature)();
            Timer::after(sample_gap).await;
        }
        round_to_step(sum / self.tuning.sample_count as i32, self.tuning.round_step)
    }

    // Interlock hooks: a heat-pump variant refuses to fire unless the
    // circulation valves are in a compatible position. The base controller
    // always permits switching.

    fn turn_on_if_possible(&self) -> bool {
        self.relay.on();
        true
    }

    fn turn_off_if_possible(&self) -> bool {
        self.relay.off();
        true
    }
}
