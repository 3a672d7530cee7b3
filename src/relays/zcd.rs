//! Mains zero-crossing detector.
//!
//! The detector input toggles on every half-cycle of the AC waveform
//! (every 10 ms at 50 Hz). Switching the GPO relays just after a crossing
//! minimises contact arcing and inrush.

use std::rc::Rc;
use std::time::{Duration, Instant};

use log::error;

use crate::ports::InputPort;

pub struct ZeroCrossDetector {
    pin: Rc<dyn InputPort>,
    timeout: Duration,
}

impl ZeroCrossDetector {
    pub fn new(pin: Rc<dyn InputPort>, timeout_ms: u32) -> Self {
        Self {
            pin,
            timeout: Duration::from_millis(u64::from(timeout_ms)),
        }
    }

    /// Block until the detector level changes from its current sample.
    ///
    /// The wait is capped at the configured timeout (several missed
    /// half-cycles); expiry is logged and the caller switches anyway, so a
    /// failed detector degrades to unsynchronised switching instead of
    /// wedging the relay.
    pub fn wait_for_edge(&self) {
        let level = self.pin.is_high();
        let start = Instant::now();
        while self.pin.is_high() == level {
            if start.elapsed() > self.timeout {
                error!("zero crossing not detected");
                break;
            }
            std::thread::sleep(Duration::from_micros(100));
        }
    }
}
