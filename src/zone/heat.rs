//! The heater zone orchestrator.
//!
//! Heating involves the whole plant: the filtration pump must be stopped
//! before the suction/return valves move and restarted before the heater may
//! fire, so this zone owns its own sequencing instead of the generic runner.
//! It also services the spa-refill override, which preempts the normal heat
//! evaluation: heater off, pump off, valves to the refill circuit, pump on
//! for the requested number of minutes (cancellable by writing the refill
//! mode back to manual-off), then everything re-evaluates from scratch.
//!
//! The numeric heater target is re-derived every tick from whichever source
//! the published status says is active (manual pool/spa byte or the running
//! schedule's config, whole degrees times one hundred) and pushed to the
//! thermostat when it changes.

use core::cell::Cell;
use core::time::Duration;
use std::rc::Rc;

use async_io_mini::Timer;
use log::{debug, error, info, warn};

use crate::config::SystemConfig;
use crate::heater::HeaterController;
use crate::ports::{LocalTime, WallClock};
use crate::relays::Relay;
use crate::schedule::Schedule;
use crate::store::ConfigStore;
use crate::valves::ValveManager;
use crate::zone::{ScheduleSlot, Status};

// ---------------------------------------------------------------------------
// Modes, statuses, evaluation
// ---------------------------------------------------------------------------

/// Heater operating mode, one byte on the wire. Also the `heat_mode` field
/// of heater schedules (where only `Pool` and `Spa` are meaningful).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatMode {
    OffOrFilter,
    Pool,
    Spa,
    Automatic,
}

impl HeatMode {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Self::OffOrFilter),
            0x01 => Some(Self::Pool),
            0x02 => Some(Self::Spa),
            0x03 => Some(Self::Automatic),
            _ => None,
        }
    }
}

/// Heater zone status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HeatStatus {
    ManualOffFilter = 0x00,
    ManualPool = 0x01,
    ManualSpa = 0x02,
    ScheduleOff = 0x03,
    Schedule1On = 0x04,
    Schedule2On = 0x05,
    Transitioning = 0xFF,
}

impl HeatStatus {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Self::ManualOffFilter),
            0x01 => Some(Self::ManualPool),
            0x02 => Some(Self::ManualSpa),
            0x03 => Some(Self::ScheduleOff),
            0x04 => Some(Self::Schedule1On),
            0x05 => Some(Self::Schedule2On),
            0xFF => Some(Self::Transitioning),
            _ => None,
        }
    }
}

/// The heater manual configuration attribute: two whole-degree targets,
/// pool first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatManualConfig {
    pub pool_degrees: u8,
    pub spa_degrees: u8,
}

impl HeatManualConfig {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            pool_degrees: bytes.first().copied().unwrap_or(0),
            spa_degrees: bytes.get(1).copied().unwrap_or(0),
        }
    }
}

/// Which way the suction/return pair should point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Circuit {
    Pool,
    Spa,
}

/// The heat evaluator result. `heating == false` with the pool circuit is
/// plain filtration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatEvaluation {
    pub circuit: Circuit,
    pub heating: bool,
    pub status: HeatStatus,
}

/// Log-worthy observations from an Automatic evaluation, reported only when
/// the evaluation is actually applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeatAdvisories {
    pub not_both_enabled: bool,
    pub overlapping: bool,
    /// Schedule number (1 or 2) whose `heat_mode` field was unusable.
    pub invalid_heat_mode: Option<u8>,
}

/// Pure heater mode/schedule evaluation. A running schedule with an
/// unusable `heat_mode` degrades to filtration.
pub fn evaluate_heat(
    mode: HeatMode,
    sch1: &Schedule,
    sch2: &Schedule,
    now: &LocalTime,
) -> (HeatEvaluation, HeatAdvisories) {
    let filter = |status| HeatEvaluation { circuit: Circuit::Pool, heating: false, status };
    match mode {
        HeatMode::OffOrFilter => (filter(HeatStatus::ManualOffFilter), HeatAdvisories::default()),
        HeatMode::Pool => (
            HeatEvaluation { circuit: Circuit::Pool, heating: true, status: HeatStatus::ManualPool },
            HeatAdvisories::default(),
        ),
        HeatMode::Spa => (
            HeatEvaluation { circuit: Circuit::Spa, heating: true, status: HeatStatus::ManualSpa },
            HeatAdvisories::default(),
        ),
        HeatMode::Automatic => {
            let mut advisories = HeatAdvisories {
                not_both_enabled: !(sch1.enabled && sch2.enabled),
                overlapping: sch1.is_running(now) && sch2.is_running(now),
                invalid_heat_mode: None,
            };
            let (schedule, number, status) = if sch1.is_running(now) {
                (sch1, 1, HeatStatus::Schedule1On)
            } else if sch2.is_running(now) {
                (sch2, 2, HeatStatus::Schedule2On)
            } else {
                return (filter(HeatStatus::ScheduleOff), advisories);
            };
            let evaluation = match schedule.heat_mode.and_then(HeatMode::from_byte) {
                Some(HeatMode::Pool) => {
                    HeatEvaluation { circuit: Circuit::Pool, heating: true, status }
                }
                Some(HeatMode::Spa) => {
                    HeatEvaluation { circuit: Circuit::Spa, heating: true, status }
                }
                _ => {
                    advisories.invalid_heat_mode = Some(number);
                    filter(HeatStatus::ScheduleOff)
                }
            };
            (evaluation, advisories)
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct HeatZone {
    store: Rc<ConfigStore>,
    clock: Rc<dyn WallClock>,
    valves: Rc<ValveManager>,
    heater: Rc<HeaterController>,
    pump: Relay,
    poll: Duration,
    pump_on_settle: Duration,
    pump_off_settle: Duration,
    refill_check: Duration,
    last: Cell<Option<HeatEvaluation>>,
    last_mode_byte: Cell<Option<u8>>,
    sch1: ScheduleSlot,
    sch2: ScheduleSlot,
}

impl HeatZone {
    pub fn new(
        store: Rc<ConfigStore>,
        clock: Rc<dyn WallClock>,
        valves: Rc<ValveManager>,
        heater: Rc<HeaterController>,
        pump: Relay,
        config: &SystemConfig,
    ) -> Self {
        Self {
            store,
            clock,
            valves,
            heater,
            pump,
            poll: Duration::from_millis(u64::from(config.zone_poll_ms)),
            pump_on_settle: Duration::from_millis(u64::from(config.pump_on_settle_ms)),
            pump_off_settle: Duration::from_millis(u64::from(config.pump_off_settle_ms)),
            refill_check: Duration::from_millis(u64::from(config.spa_refill_check_ms)),
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

    /// One orchestration tick: service a pending spa refill, re-evaluate the
    /// heat mode, settle a dangling transition status, re-derive the target.
    pub async fn poll_once(&self) {
        self.check_spa_refill().await;

        let mode_byte = self.store.heat.mode.read_byte();
        match HeatMode::from_byte(mode_byte) {
            Some(mode) => {
                let now = self.clock.now();
                let sch1 = self.sch1.current(&self.store.heat.schedule1);
                let sch2 = self.sch2.current(&self.store.heat.schedule2);
                let (evaluation, advisories) = evaluate_heat(mode, &sch1, &sch2, &now);
                if self.last.get() != Some(evaluation) {
                    if mode == HeatMode::Automatic {
                        self.log_advisories(advisories);
                    }
                    self.apply(evaluation).await;
                    self.last.set(Some(evaluation));
                }
            }
            None => {
                // no actuation for an unknown mode byte, the plant holds its
                // last state
                if self.last_mode_byte.get() != Some(mode_byte) {
                    error!("heat: unknown mode byte 0x{mode_byte:02X}");
                }
            }
        }
        self.last_mode_byte.set(Some(mode_byte));

        self.settle_status();
        self.update_target().await;
    }

    fn log_advisories(&self, advisories: HeatAdvisories) {
        if advisories.not_both_enabled {
            warn!("heat: auto mode but both schedules are not enabled");
        }
        if advisories.overlapping {
            warn!("heat: schedules are overlapping");
        }
        if let Some(n) = advisories.invalid_heat_mode {
            error!("heat: schedule {n} has an invalid heat mode, filtering instead");
        }
    }

    /// The full changeover sequence: heater off first, pump stopped before
    /// any valve moves, pump restarted before the heater may fire.
    async fn apply(&self, evaluation: HeatEvaluation) {
        debug!("heat: applying {evaluation:?}");
        self.store.heat.status.publish_byte(HeatStatus::Transitioning.as_byte());
        self.heater.disable();
        self.pump_off().await;
        match evaluation.circuit {
            Circuit::Pool => self.valves.set_pool_mode().await,
            Circuit::Spa => self.valves.set_spa_mode().await,
        }
        self.pump_on().await;
        if evaluation.heating {
            self.heater.enable().await;
        }
        self.store.heat.status.publish_byte(evaluation.status.as_byte());
    }

    /// Operator-triggered spa top-up. Preempts the heat evaluation for its
    /// whole duration; afterwards the refill mode is reset and the heat
    /// evaluation re-applies from scratch.
    async fn check_spa_refill(&self) {
        if self.store.spa_refill.mode.read_byte() != 0x01 {
            return;
        }
        let minutes = self.store.spa_refill.manual_config.read_byte();
        debug!("spa refill: setting valves to refill circuit");
        self.store.spa_refill.status.publish_byte(Status::Transitioning.as_byte());
        self.heater.disable();
        self.pump_off().await;
        self.valves.set_spa_refill().await;
        self.store.spa_refill.status.publish_byte(Status::ManualOn.as_byte());
        info!("spa refill on: {minutes} minutes");
        self.pump_on().await;

        let total = Duration::from_secs(u64::from(minutes) * 60);
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            Timer::after(self.refill_check).await;
            elapsed += self.refill_check;
            if self.store.spa_refill.mode.read_byte() == 0x00 {
                info!("spa refill cancelled");
                break;
            }
        }

        info!("spa refill off");
        self.store.spa_refill.status.publish_byte(Status::Transitioning.as_byte());
        self.pump_off().await;
        self.store.spa_refill.status.publish_byte(Status::ManualOff.as_byte());
        self.store.spa_refill.mode.publish_byte(0x00);
        // hand the valves back to the heat evaluation
        self.last.set(None);
    }

    /// A `Transitioning` status must never be terminal: map it back to the
    /// current mode's resting status if an interrupted sequence left it
    /// dangling.
    fn settle_status(&self) {
        if self.store.heat.status.read_byte() != HeatStatus::Transitioning.as_byte() {
            return;
        }
        let resting = match HeatMode::from_byte(self.store.heat.mode.read_byte()) {
            Some(HeatMode::OffOrFilter) => HeatStatus::ManualOffFilter,
            Some(HeatMode::Pool) => HeatStatus::ManualPool,
            Some(HeatMode::Spa) => HeatStatus::ManualSpa,
            Some(HeatMode::Automatic) => HeatStatus::ScheduleOff,
            None => return,
        };
        self.store.heat.status.publish_byte(resting.as_byte());
    }

    /// Push the active source's temperature to the thermostat when it
    /// changes. Sources are whole degrees; the thermostat wants centi.
    async fn update_target(&self) {
        let status = HeatStatus::from_byte(self.store.heat.status.read_byte());
        let manual = HeatManualConfig::from_bytes(&self.store.heat.manual_config.read());
        let degrees = match status {
            Some(HeatStatus::ManualPool) => manual.pool_degrees,
            Some(HeatStatus::ManualSpa) => manual.spa_degrees,
            Some(HeatStatus::Schedule1On) => self.sch1.current(&self.store.heat.schedule1).config,
            Some(HeatStatus::Schedule2On) => self.sch2.current(&self.store.heat.schedule2).config,
            _ => return,
        };
        let target_centi = i32::from(degrees) * 100;
        if self.heater.target() != target_centi {
            info!("heater target updated: {target_centi} centi-deg");
            if let Err(e) = self.heater.set_target(target_centi).await {
                warn!("heater target rejected: {e}");
            }
        }
    }

    async fn pump_off(&self) {
        debug!("stopping the pump");
        self.pump.off();
        Timer::after(self.pump_off_settle).await;
        debug!("pump off");
    }

    async fn pump_on(&self) {
        debug!("starting the pump");
        self.pump.on();
        Timer::after(self.pump_on_settle).await;
        debug!("pump on");
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
    fn manual_modes_map_directly() {
        let s = Schedule::default();
        let now = noon_monday();

        let (e, _) = evaluate_heat(HeatMode::OffOrFilter, &s, &s, &now);
        assert_eq!(e, HeatEvaluation {
            circuit: Circuit::Pool,
            heating: false,
            status: HeatStatus::ManualOffFilter,
        });

        let (e, _) = evaluate_heat(HeatMode::Pool, &s, &s, &now);
        assert!(e.heating);
        assert_eq!(e.circuit, Circuit::Pool);
        assert_eq!(e.status, HeatStatus::ManualPool);

        let (e, _) = evaluate_heat(HeatMode::Spa, &s, &s, &now);
        assert!(e.heating);
        assert_eq!(e.circuit, Circuit::Spa);
        assert_eq!(e.status, HeatStatus::ManualSpa);
    }

    #[test]
    fn automatic_runs_the_active_schedule() {
        let now = noon_monday();
        let s1 = sch("0,86399,127,1,30,1"); // pool
        let s2 = sch("0,86399,127,1,38,2"); // spa

        let (e, a) = evaluate_heat(HeatMode::Automatic, &s1, &s2, &now);
        assert_eq!(e.circuit, Circuit::Pool);
        assert!(e.heating);
        assert_eq!(e.status, HeatStatus::Schedule1On);
        assert!(a.overlapping);

        let idle = sch("0,100,127,1,30,1");
        let (e, a) = evaluate_heat(HeatMode::Automatic, &idle, &s2, &now);
        assert_eq!(e.circuit, Circuit::Spa);
        assert_eq!(e.status, HeatStatus::Schedule2On);
        assert!(!a.overlapping);
    }

    #[test]
    fn automatic_without_running_schedule_filters() {
        let now = noon_monday();
        let s1 = sch("0,100,127,1,30,1");
        let s2 = sch("200,300,127,0,38,2");
        let (e, a) = evaluate_heat(HeatMode::Automatic, &s1, &s2, &now);
        assert_eq!(e, HeatEvaluation {
            circuit: Circuit::Pool,
            heating: false,
            status: HeatStatus::ScheduleOff,
        });
        assert!(a.not_both_enabled);
    }

    #[test]
    fn invalid_schedule_heat_mode_degrades_to_filtration() {
        let now = noon_monday();
        // heat_mode 3 (Automatic) makes no sense inside a schedule
        let s1 = sch("0,86399,127,1,30,3");
        let s2 = Schedule::default();
        let (e, a) = evaluate_heat(HeatMode::Automatic, &s1, &s2, &now);
        assert!(!e.heating);
        assert_eq!(e.status, HeatStatus::ScheduleOff);
        assert_eq!(a.invalid_heat_mode, Some(1));

        // missing heat_mode field entirely
        let s1 = sch("0,86399,127,1,30");
        let (e, a) = evaluate_heat(HeatMode::Automatic, &s1, &s2, &now);
        assert!(!e.heating);
        assert_eq!(a.invalid_heat_mode, Some(1));
    }

    #[test]
    fn heat_status_byte_roundtrip() {
        for s in [
            HeatStatus::ManualOffFilter,
            HeatStatus::ManualPool,
            HeatStatus::ManualSpa,
            HeatStatus::ScheduleOff,
            HeatStatus::Schedule1On,
            HeatStatus::Schedule2On,
            HeatStatus::Transitioning,
        ] {
            assert_eq!(HeatStatus::from_byte(s.as_byte()), Some(s));
        }
        assert_eq!(HeatStatus::from_byte(0x06), None);
    }
}
