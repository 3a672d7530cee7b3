//! Relay drivers.
//!
//! Three switching behaviors share one `Relay` front:
//!
//! - **Plain** relays switch the pin immediately (the valve motor relays,
//!   driven through the output expander — motors do not care about phase).
//! - **ZeroCross** relays wait for the next mains zero crossing before
//!   switching (the GPO relays: pool light, garden light, filtration pump,
//!   valve master power). Energising additionally waits a few milliseconds
//!   after the crossing to compensate for coil pull-in time; de-energising
//!   switches at the crossing since contact release is already slow.
//! - **Pulse** relays hold an external latching circuit energised by a
//!   continuous square wave (the heater demand line). `on`/`off` only flip
//!   the demand flag; the [`RelayBank::run_pulse`] task toggles the pin while
//!   the flag is set, and the latch drops out when the pulses stop.
//!
//! Relays are cheaply cloneable handles: clones share the underlying pin and
//! pulse flag, so the heater controller and a zone loop can both hold the
//! heater relay.

pub mod zcd;

use core::cell::Cell;
use core::time::Duration;
use std::rc::Rc;

use log::debug;

use crate::config::SystemConfig;
use crate::ports::{InputPort, OutputPort};

pub use zcd::ZeroCrossDetector;

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum RelayKind {
    Plain,
    ZeroCross { zcd: Rc<ZeroCrossDetector>, switch_delay: Duration },
    Pulse { demand: Rc<Cell<bool>> },
}

#[derive(Clone)]
pub struct Relay {
    name: &'static str,
    pin: Rc<dyn OutputPort>,
    kind: RelayKind,
}

impl Relay {
    pub fn plain(name: &'static str, pin: Rc<dyn OutputPort>) -> Self {
        Self { name, pin, kind: RelayKind::Plain }
    }

    pub fn zero_cross(
        name: &'static str,
        pin: Rc<dyn OutputPort>,
        zcd: Rc<ZeroCrossDetector>,
        switch_delay_ms: u32,
    ) -> Self {
        Self {
            name,
            pin,
            kind: RelayKind::ZeroCross {
                zcd,
                switch_delay: Duration::from_millis(u64::from(switch_delay_ms)),
            },
        }
    }

    pub fn pulse(name: &'static str, pin: Rc<dyn OutputPort>) -> Self {
        Self {
            name,
            pin,
            kind: RelayKind::Pulse { demand: Rc::new(Cell::new(false)) },
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn on(&self) {
        debug!("{}: on", self.name);
        match &self.kind {
            RelayKind::Plain => self.pin.set(true),
            RelayKind::ZeroCross { zcd, switch_delay } => {
                zcd.wait_for_edge();
                // the coil pulls in ~5 ms after the GPIO rises; delay so the
                // contacts close near the crossing rather than mid-cycle
                std::thread::sleep(*switch_delay);
                self.pin.set(true);
            }
            RelayKind::Pulse { demand } => demand.set(true),
        }
    }

    pub fn off(&self) {
        debug!("{}: off", self.name);
        match &self.kind {
            RelayKind::Plain => self.pin.set(false),
            RelayKind::ZeroCross { zcd, .. } => {
                // contact release is slow by itself, no extra delay
                zcd.wait_for_edge();
                self.pin.set(false);
            }
            RelayKind::Pulse { demand } => demand.set(false),
        }
    }

    pub fn is_on(&self) -> bool {
        match &self.kind {
            RelayKind::Pulse { demand } => demand.get(),
            _ => self.pin.get(),
        }
    }

    /// One half-period of the pulse waveform; no-op for other kinds or when
    /// demand is off (the latch then decays open on its own).
    fn pulse_step(&self) {
        if let RelayKind::Pulse { demand } = &self.kind {
            if demand.get() {
                self.pin.set(!self.pin.get());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RelayBank
// ---------------------------------------------------------------------------

/// The output pins for every relay, already adapted to [`OutputPort`].
pub struct RelayPins {
    pub lights: Rc<dyn OutputPort>,
    pub garden_light: Rc<dyn OutputPort>,
    pub pump: Rc<dyn OutputPort>,
    pub valve_power: Rc<dyn OutputPort>,
    pub suction_valve: Rc<dyn OutputPort>,
    pub return_valve: Rc<dyn OutputPort>,
    pub solar_valve: Rc<dyn OutputPort>,
    pub water_feature_valve: Rc<dyn OutputPort>,
    pub heater: Rc<dyn OutputPort>,
}

/// Every relay in the system, constructed once at boot and handed out as
/// clones. All relays start de-energised.
pub struct RelayBank {
    pub lights: Relay,
    pub garden_light: Relay,
    pub pump: Relay,
    pub valve_power: Relay,
    pub suction_valve: Relay,
    pub return_valve: Relay,
    pub solar_valve: Relay,
    pub water_feature_valve: Relay,
    pub heater: Relay,
    pulse_period: Duration,
}

impl RelayBank {
    pub fn new(pins: RelayPins, zcd_pin: Rc<dyn InputPort>, config: &SystemConfig) -> Self {
        let zcd = Rc::new(ZeroCrossDetector::new(zcd_pin, config.zcd_timeout_ms));
        let delay = config.zcd_switch_delay_ms;
        let bank = Self {
            lights: Relay::zero_cross("lights", pins.lights, zcd.clone(), delay),
            garden_light: Relay::zero_cross("garden_light", pins.garden_light, zcd.clone(), delay),
            pump: Relay::zero_cross("pump", pins.pump, zcd.clone(), delay),
            valve_power: Relay::zero_cross("valve_power", pins.valve_power, zcd, delay),
            suction_valve: Relay::plain("suction_valve", pins.suction_valve),
            return_valve: Relay::plain("return_valve", pins.return_valve),
            solar_valve: Relay::plain("solar_valve", pins.solar_valve),
            water_feature_valve: Relay::plain("water_feature_valve", pins.water_feature_valve),
            heater: Relay::pulse("heater", pins.heater),
            pulse_period: Duration::from_millis(u64::from(config.pulse_period_ms)),
        };
        bank.all_off();
        bank
    }

    pub fn all_off(&self) {
        self.lights.off();
        self.garden_light.off();
        self.pump.off();
        self.valve_power.off();
        self.suction_valve.off();
        self.return_valve.off();
        self.solar_valve.off();
        self.water_feature_valve.off();
        self.heater.off();
        debug!("all relays off");
    }

    /// Drive the pulse-sustained relays. Must be running for the heater latch
    /// to hold in.
    pub async fn run_pulse(&self) {
        loop {
            self.heater.pulse_step();
            async_io_mini::Timer::after(self.pulse_period).await;
        }
    }
}
