//! Named attribute store.
//!
//! The wireless configuration channel is abstracted as a table of small byte
//! attributes, one per characteristic: each control zone exposes two
//! schedules, a manual configuration, a mode and a status, plus the global
//! light-brand and water-temperature attributes.
//!
//! Each attribute carries two notification signals:
//!
//! - `written` fires when an *external* writer (the wireless task) stores a
//!   value; control loops can suspend on it.
//! - `changed` fires when the *core* publishes a value that differs from the
//!   stored one; the transport observer forwards these as notifications.
//!
//! `embassy_sync::signal::Signal` keeps at most one pending notification, so
//! a waiter resumed after several writes sees only the latest value. That is
//! the intended semantics: consumers re-read the attribute, they never replay
//! a write history.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::error;

use crate::error::{Error, Result};

/// Largest attribute value (the schedule strings are the longest).
pub const MAX_VALUE_LEN: usize = 48;

/// An attribute value snapshot.
pub type Value = heapless::Vec<u8, MAX_VALUE_LEN>;

// ---------------------------------------------------------------------------
// Attribute
// ---------------------------------------------------------------------------

pub struct Attribute {
    name: &'static str,
    value: Mutex<CriticalSectionRawMutex, RefCell<Value>>,
    written: Signal<CriticalSectionRawMutex, ()>,
    changed: Signal<CriticalSectionRawMutex, ()>,
}

impl Attribute {
    pub fn new(name: &'static str, initial: &[u8]) -> Self {
        let mut v = Value::new();
        if v.extend_from_slice(initial).is_err() {
            error!("store: initial value for {name} truncated");
        }
        Self {
            name,
            value: Mutex::new(RefCell::new(v)),
            written: Signal::new(),
            changed: Signal::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Copy the current value out under the store lock. A single attribute is
    /// therefore never observed torn; consistency *across* attributes is not
    /// transacted and consumers re-read every evaluation cycle.
    pub fn read(&self) -> Value {
        self.value.lock(|v| v.borrow().clone())
    }

    /// First byte of the value, or 0 when empty. Most attributes are
    /// single-byte codes.
    pub fn read_byte(&self) -> u8 {
        self.value.lock(|v| v.borrow().first().copied().unwrap_or(0))
    }

    /// Store a value on behalf of an external writer and fire `written`.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut v = Value::new();
        v.extend_from_slice(bytes)
            .map_err(|()| Error::Store("value too large"))?;
        self.value.lock(|cur| cur.replace(v));
        self.written.signal(());
        Ok(())
    }

    /// Store a value on behalf of the core. Fires `changed` only when the
    /// value actually differs, so transport notifications are edge-triggered.
    pub fn publish(&self, bytes: &[u8]) {
        let mut v = Value::new();
        if v.extend_from_slice(bytes).is_err() {
            error!("store: published value for {} too large", self.name);
            return;
        }
        let differs = self.value.lock(|cur| {
            if *cur.borrow() == v {
                false
            } else {
                cur.replace(v);
                true
            }
        });
        if differs {
            self.changed.signal(());
        }
    }

    pub fn publish_byte(&self, byte: u8) {
        self.publish(&[byte]);
    }

    /// Suspend until the next external write.
    pub async fn written(&self) {
        self.written.wait().await;
    }

    /// Suspend until the core next publishes a different value.
    pub async fn changed(&self) {
        self.changed.wait().await;
    }
}

// ---------------------------------------------------------------------------
// Attribute groups
// ---------------------------------------------------------------------------

/// The per-zone characteristic set. The water feature and garden light never
/// use `manual_config`; it is carried uniformly so the zone loops stay
/// generic.
pub struct ZoneAttributes {
    pub schedule1: Attribute,
    pub schedule2: Attribute,
    pub manual_config: Attribute,
    pub mode: Attribute,
    pub status: Attribute,
}

impl ZoneAttributes {
    fn new(names: &ZoneNames, defaults: &ZoneDefaults) -> Self {
        Self {
            schedule1: Attribute::new(names.schedule1, defaults.schedule1.as_bytes()),
            schedule2: Attribute::new(names.schedule2, defaults.schedule2.as_bytes()),
            manual_config: Attribute::new(names.manual_config, defaults.manual_config),
            mode: Attribute::new(names.mode, &[defaults.mode]),
            status: Attribute::new(names.status, &[defaults.status]),
        }
    }
}

/// The spa-refill override group: a duration (minutes, one byte), a mode and
/// a status. It has no schedules; refill is always operator-triggered.
pub struct SpaRefillAttributes {
    pub manual_config: Attribute,
    pub mode: Attribute,
    pub status: Attribute,
}

struct ZoneNames {
    schedule1: &'static str,
    schedule2: &'static str,
    manual_config: &'static str,
    mode: &'static str,
    status: &'static str,
}

struct ZoneDefaults {
    schedule1: &'static str,
    schedule2: &'static str,
    manual_config: &'static [u8],
    mode: u8,
    status: u8,
}

/// The full attribute table.
pub struct ConfigStore {
    pub lights: ZoneAttributes,
    pub water_feature: ZoneAttributes,
    pub garden_light: ZoneAttributes,
    pub heat: ZoneAttributes,
    pub spa_refill: SpaRefillAttributes,
    pub lights_brand: Attribute,
    pub water_temperature: Attribute,
}

impl ConfigStore {
    /// The factory attribute table: everything in manual-off, disabled
    /// placeholder schedules, Spa Electric light brand, 28 C pool / 40 C spa
    /// manual heat targets.
    pub fn with_defaults() -> Self {
        Self {
            lights: ZoneAttributes::new(
                &ZoneNames {
                    schedule1: "lights.schedule1",
                    schedule2: "lights.schedule2",
                    manual_config: "lights.manual_config",
                    mode: "lights.mode",
                    status: "lights.status",
                },
                &ZoneDefaults {
                    schedule1: "18000,25200,127,0,5",
                    schedule2: "64800,72000,127,0,7",
                    manual_config: &[4], // yellow
                    mode: 0,
                    status: 0,
                },
            ),
            water_feature: ZoneAttributes::new(
                &ZoneNames {
                    schedule1: "water_feature.schedule1",
                    schedule2: "water_feature.schedule2",
                    manual_config: "water_feature.manual_config",
                    mode: "water_feature.mode",
                    status: "water_feature.status",
                },
                &ZoneDefaults {
                    schedule1: "18000,25200,127,0,5",
                    schedule2: "64800,72000,127,0,7",
                    manual_config: &[],
                    mode: 0,
                    status: 0,
                },
            ),
            garden_light: ZoneAttributes::new(
                &ZoneNames {
                    schedule1: "garden_light.schedule1",
                    schedule2: "garden_light.schedule2",
                    manual_config: "garden_light.manual_config",
                    mode: "garden_light.mode",
                    status: "garden_light.status",
                },
                &ZoneDefaults {
                    schedule1: "18000,25200,127,0,5",
                    schedule2: "64800,72000,127,0,7",
                    manual_config: &[],
                    mode: 0,
                    status: 0,
                },
            ),
            heat: ZoneAttributes::new(
                &ZoneNames {
                    schedule1: "heat.schedule1",
                    schedule2: "heat.schedule2",
                    manual_config: "heat.manual_config",
                    mode: "heat.mode",
                    status: "heat.status",
                },
                &ZoneDefaults {
                    schedule1: "46800,64800,127,0,30,1",
                    schedule2: "64800,68400,127,0,38,2",
                    manual_config: &[0x1C, 0x28], // 28 C pool, 40 C spa
                    mode: 0,
                    status: 0,
                },
            ),
            spa_refill: SpaRefillAttributes {
                manual_config: Attribute::new("spa_refill.manual_config", &[1]),
                mode: Attribute::new("spa_refill.mode", &[0]),
                status: Attribute::new("spa_refill.status", &[0]),
            },
            lights_brand: Attribute::new("lights_brand", &[0]),
            water_temperature: Attribute::new("water_temperature", &[]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips_and_signals() {
        let a = Attribute::new("t", b"");
        a.write(b"100,200,127,1").unwrap();
        assert_eq!(a.read().as_slice(), b"100,200,127,1");
        assert!(a.written.try_take().is_some());
        // external writes never fire the notify signal
        assert!(a.changed.try_take().is_none());
    }

    #[test]
    fn oversize_write_is_rejected_and_value_retained() {
        let a = Attribute::new("t", b"keep");
        let big = [0u8; MAX_VALUE_LEN + 1];
        assert_eq!(a.write(&big), Err(Error::Store("value too large")));
        assert_eq!(a.read().as_slice(), b"keep");
    }

    #[test]
    fn publish_is_edge_triggered() {
        let a = Attribute::new("t", &[0x00]);
        a.publish_byte(0x03);
        assert!(a.changed.try_take().is_some());
        a.publish_byte(0x03); // same value, no edge
        assert!(a.changed.try_take().is_none());
        a.publish_byte(0x02);
        assert!(a.changed.try_take().is_some());
        assert_eq!(a.read_byte(), 0x02);
    }

    #[test]
    fn read_byte_of_empty_value_is_zero() {
        let a = Attribute::new("t", &[]);
        assert_eq!(a.read_byte(), 0);
    }

    #[test]
    fn default_table_is_seeded() {
        let store = ConfigStore::with_defaults();
        assert_eq!(store.lights.schedule1.read().as_slice(), b"18000,25200,127,0,5");
        assert_eq!(store.heat.manual_config.read().as_slice(), &[0x1C, 0x28]);
        assert_eq!(store.spa_refill.manual_config.read_byte(), 1);
        assert_eq!(store.lights_brand.read_byte(), 0);
        assert_eq!(store.heat.mode.read_byte(), 0);
    }
}
