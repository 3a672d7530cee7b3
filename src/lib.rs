//! AquaDeck pool & spa controller library.
//!
//! Exposes the control-logic modules for integration testing and external
//! inspection. Everything here is hardware-agnostic: real pins enter through
//! the port traits in [`ports`], so the whole plant runs against simulated
//! hardware on the host.

#![deny(unused_must_use)]

pub mod config;
pub mod error;
pub mod heater;
pub mod lights;
pub mod ports;
pub mod relays;
pub mod schedule;
pub mod sensors;
pub mod store;
pub mod valves;
pub mod zone;
