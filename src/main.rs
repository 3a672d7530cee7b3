//! AquaDeck — Main Entry Point
//!
//! Wires the simulated hardware to the control tasks and runs them on a
//! single-threaded executor:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Hardware (port traits)                    │
//! │  OutputPort × 9   InputPort (ZCD)   AnalogPort × 2   Clock   │
//! ├──────────────────────────────────────────────────────────────┤
//! │  RelayBank ── ValveManager ── HeaterController ── Lights     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ZoneRunner × 3 · HeatZone · brand watch · telemetry ·       │
//! │  heater loop · pulse driver      (one LocalExecutor)         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! On the device the pins come from the GPIO matrix and the I/O expander
//! through [`aquadeck::ports::HalOutput`]; this binary substitutes the `sim`
//! ports so the full task graph can be exercised on a workstation.

#![deny(unused_must_use)]

use std::rc::Rc;

use anyhow::Result;
use edge_executor::LocalExecutor;
use futures_lite::future;
use log::info;

use aquadeck::config::SystemConfig;
use aquadeck::heater::HeaterController;
use aquadeck::lights::{Brand, LightController};
use aquadeck::ports::sim::{SimAnalog, SimPin, SystemClock};
use aquadeck::ports::WallClock;
use aquadeck::relays::{RelayBank, RelayPins};
use aquadeck::sensors;
use aquadeck::store::ConfigStore;
use aquadeck::valves::ValveManager;
use aquadeck::zone::heat::HeatZone;
use aquadeck::zone::runner::{
    run_brand_watch, LightZone, RelayZone, WaterFeatureZone, ZoneRunner,
};

fn sim_pin() -> Rc<SimPin> {
    Rc::new(SimPin::new())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("AquaDeck v{} (host simulation)", env!("CARGO_PKG_VERSION"));

    let config = SystemConfig::default();

    // --- hardware ---------------------------------------------------------
    let pins = RelayPins {
        lights: sim_pin(),
        garden_light: sim_pin(),
        pump: sim_pin(),
        valve_power: sim_pin(),
        suction_valve: sim_pin(),
        return_valve: sim_pin(),
        solar_valve: sim_pin(),
        water_feature_valve: sim_pin(),
        heater: sim_pin(),
    };
    let zcd_pin = sim_pin();
    // a resting valve circuit draws nothing; the thermistor sits mid-scale
    let valve_sense = Rc::new(SimAnalog::new(100));
    let thermistor = Rc::new(SimAnalog::new(1200));
    let clock: Rc<dyn WallClock> = Rc::new(SystemClock);

    // --- plant ------------------------------------------------------------
    let bank = Rc::new(RelayBank::new(pins, zcd_pin, &config));
    let valves = Rc::new(ValveManager::new(&bank, valve_sense, config.valves.clone()));
    let read_temperature: Rc<dyn Fn() -> i32> = {
        let adc = thermistor.clone();
        Rc::new(move || sensors::water_temp_centi(&*adc))
    };
    let heater = Rc::new(HeaterController::new(
        bank.heater.clone(),
        read_temperature,
        config.heater.clone(),
    ));
    let light = Rc::new(LightController::new(bank.lights.clone(), Brand::SpaElectric));
    let store = Rc::new(ConfigStore::with_defaults());

    // --- tasks ------------------------------------------------------------
    let ex: LocalExecutor<8> = LocalExecutor::default();

    {
        let bank = bank.clone();
        ex.spawn(async move { bank.run_pulse().await }).detach();
    }
    {
        let heater = heater.clone();
        ex.spawn(async move { heater.run().await }).detach();
    }
    {
        let runner = ZoneRunner::new(
            "lights",
            store.clone(),
            |s| &s.lights,
            clock.clone(),
            LightZone::new(light.clone()),
            config.zone_poll_ms,
        );
        ex.spawn(async move { runner.run().await }).detach();
    }
    {
        let runner = ZoneRunner::new(
            "garden_light",
            store.clone(),
            |s| &s.garden_light,
            clock.clone(),
            RelayZone::new(bank.garden_light.clone()),
            config.zone_poll_ms,
        );
        ex.spawn(async move { runner.run().await }).detach();
    }
    {
        let runner = ZoneRunner::new(
            "water_feature",
            store.clone(),
            |s| &s.water_feature,
            clock.clone(),
            WaterFeatureZone::new(valves.clone()),
            config.zone_poll_ms,
        );
        ex.spawn(async move { runner.run().await }).detach();
    }
    {
        let heat = HeatZone::new(
            store.clone(),
            clock.clone(),
            valves.clone(),
            heater.clone(),
            bank.pump.clone(),
            &config,
        );
        ex.spawn(async move { heat.run().await }).detach();
    }
    ex.spawn(run_brand_watch(light.clone(), store.clone())).detach();
    {
        let heater = heater.clone();
        let store = store.clone();
        let (poll, hold) = (config.telemetry_poll_ms, config.telemetry_hold_ms);
        ex.spawn(async move {
            sensors::run_telemetry(heater, &store.water_temperature, poll, hold).await;
        })
        .detach();
    }

    info!("all tasks started");
    future::block_on(ex.run(future::pending::<()>()));
    Ok(())
}
