//! The generic zone loop and the simple zone actuators.
//!
//! One `ZoneRunner` drives each of the pool light, garden light and water
//! feature zones. Every poll tick it re-reads the zone's attributes,
//! evaluates the desired state and, when the evaluation differs from the
//! last applied one, brackets the actuation with a `Transitioning` status
//! publication. The heater zone has its own orchestrator in
//! [`crate::zone::heat`].

use core::cell::Cell;
use core::time::Duration;
use std::rc::Rc;

use async_io_mini::Timer;
use log::{debug, warn};

use crate::error::Error;
use crate::lights::{Brand, ColourCode, LightController, SETUP_BRAND_BYTE};
use crate::ports::WallClock;
use crate::relays::Relay;
use crate::store::{ConfigStore, ZoneAttributes};
use crate::valves::ValveManager;
use crate::zone::{evaluate, Desired, Evaluation, Mode, ScheduleSlot, Status};

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// A zone's output side. `apply` is free to take its time (valve changeovers,
/// light pulse trains); the runner holds the zone in `Transitioning` until it
/// returns.
pub trait ZoneActuator {
    async fn apply(&self, desired: Desired);
}

/// Plain relay output (the garden light).
pub struct RelayZone {
    relay: Relay,
}

impl RelayZone {
    pub fn new(relay: Relay) -> Self {
        Self { relay }
    }
}

impl ZoneActuator for RelayZone {
    async fn apply(&self, desired: Desired) {
        match desired {
            Desired::Off => self.relay.off(),
            Desired::On { .. } => self.relay.on(),
        }
    }
}

/// Water feature valve output.
pub struct WaterFeatureZone {
    valves: Rc<ValveManager>,
}

impl WaterFeatureZone {
    pub fn new(valves: Rc<ValveManager>) -> Self {
        Self { valves }
    }
}

impl ZoneActuator for WaterFeatureZone {
    async fn apply(&self, desired: Desired) {
        self.valves
            .set_water_feature(matches!(desired, Desired::On { .. }))
            .await;
    }
}

/// Pool light output; the config byte is the Davey colour code.
pub struct LightZone {
    light: Rc<LightController>,
}

impl LightZone {
    pub fn new(light: Rc<LightController>) -> Self {
        Self { light }
    }
}

impl ZoneActuator for LightZone {
    async fn apply(&self, desired: Desired) {
        match desired {
            Desired::Off => self.light.off().await,
            Desired::On { config } => match ColourCode::from_byte(config) {
                Some(code) => self.light.set_colour(code).await,
                None => {
                    warn!("unknown light colour code {config}, turning on as-is");
                    self.light.on().await;
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

pub struct ZoneRunner<A: ZoneActuator> {
    name: &'static str,
    store: Rc<ConfigStore>,
    select: fn(&ConfigStore) -> &ZoneAttributes,
    clock: Rc<dyn WallClock>,
    actuator: A,
    poll: Duration,
    last: Cell<Option<Evaluation>>,
    last_mode_byte: Cell<Option<u8>>,
    sch1: ScheduleSlot,
    sch2: ScheduleSlot,
}

impl<A: ZoneActuator> ZoneRunner<A> {
    pub fn new(
        name: &'static str,
        store: Rc<ConfigStore>,
        select: fn(&ConfigStore) -> &ZoneAttributes,
        clock: Rc<dyn WallClock>,
        actuator: A,
        poll_ms: u32,
    ) -> Self {
        Self {
            name,
            store,
            select,
            clock,
            actuator,
            poll: Duration::from_millis(u64::from(poll_ms)),
            last: Cell::new(None),
            last_mode_byte: Cell::new(None),
            sch1: ScheduleSlot::new(),
            sch2: ScheduleSlot::new(),
        }
    }

    pub async fn run(&self) {
        loop {
            self.poll_once().await;
            Timer::after(self.poll).await;
        }
    }

    /// One evaluation tick. Public so tests and composite loops can step a
    /// zone deterministically.
    pub async fn poll_once(&self) {
        let attrs = (self.select)(&self.store);
        let now = self.clock.now();

        let mode_byte = attrs.mode.read_byte();
        if self.last_mode_byte.get() != Some(mode_byte) {
            self.last_mode_byte.set(Some(mode_byte));
            if Mode::from_byte(mode_byte).is_none() {
                warn!("{}: {}", self.name, Error::UnknownMode(mode_byte));
            }
        }
        // unknown mode bytes actuate as manual-on, the safe visible default
        let mode = Mode::from_byte(mode_byte).unwrap_or(Mode::ManualOn);

        let sch1 = self.sch1.current(&attrs.schedule1);
        let sch2 = self.sch2.current(&attrs.schedule2);
        let manual = attrs.manual_config.read_byte();

        let evaluation = evaluate(mode, manual, &sch1, &sch2, &now);
        if self.last.get() == Some(evaluation) {
            return;
        }

        if mode == Mode::Auto {
            if !(sch1.enabled && sch2.enabled) {
                warn!("{}: auto mode but both schedules are not enabled", self.name);
            }
            if sch1.is_running(&now) && sch2.is_running(&now) {
                warn!("{}: schedules are overlapping", self.name);
            }
        }

        debug!("{}: applying {:?}", self.name, evaluation.desired);
        attrs.status.publish_byte(Status::Transitioning.as_byte());
        self.actuator.apply(evaluation.desired).await;
        attrs.status.publish_byte(evaluation.status.as_byte());
        self.last.set(Some(evaluation));
    }
}

// ---------------------------------------------------------------------------
// Light brand watcher
// ---------------------------------------------------------------------------

/// React to external writes of the light-brand attribute: switch the
/// controller's brand, or run the programming sequence when the setup byte
/// is written (the attribute is then restored to the active brand).
pub async fn run_brand_watch(light: Rc<LightController>, store: Rc<ConfigStore>) {
    loop {
        store.lights_brand.written().await;
        let byte = store.lights_brand.read_byte();
        if byte == SETUP_BRAND_BYTE {
            warn!("light programming sequence requested");
            store.lights.status.publish_byte(Status::Transitioning.as_byte());
            light.setup().await;
            store.lights.status.publish_byte(Status::ManualOff.as_byte());
            store.lights_brand.publish_byte(light.brand().as_byte());
        } else if let Some(brand) = Brand::from_byte(byte) {
            light.set_brand(brand);
        } else {
            warn!("unknown light brand byte 0x{byte:02X}");
            store.lights_brand.publish_byte(light.brand().as_byte());
        }
    }
}
