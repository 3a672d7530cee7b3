//! Water temperature sensing and telemetry.
//!
//! The water thermistor (68 k NTC, beta 4190) hangs off a 3.3 k divider fed
//! from 3.3 V, read through a 950 mV full-scale ADC. Conversion failures
//! from degenerate readings (shorted or open sensor driving the divider
//! arithmetic to a zero denominator or a non-positive resistance) yield a
//! safe mid-range default instead of propagating.

use core::fmt::Write as _;
use core::time::Duration;
use std::rc::Rc;

use async_io_mini::Timer;
use log::debug;

use crate::heater::HeaterController;
use crate::ports::AnalogPort;
use crate::store::Attribute;

const BETA: f32 = 4190.0;
const RNTC: f32 = 68_000.0;
const VIN_MV: f32 = 3_300.0;
const RDIV: f32 = 3_300.0;
const VREF_MV: f32 = 950.0;
const KELVIN: f32 = 273.15;
const T0_KELVIN: f32 = 298.16;

/// Conversion result when the divider arithmetic degenerates.
const FALLBACK_C: f32 = 25.5;

/// Raw ADC counts (12-bit) to degrees Celsius.
pub fn adc_to_celsius(adc: u16) -> f32 {
    let vout = f32::from(adc) * VREF_MV / 4095.0;
    if vout <= 0.0 {
        return FALLBACK_C;
    }
    let rt = (VIN_MV * RDIV - vout * RDIV) / vout;
    if rt <= 0.0 {
        return FALLBACK_C;
    }
    let inv_t = 1.0 / T0_KELVIN + (rt / RNTC).ln() / BETA;
    if inv_t == 0.0 {
        return FALLBACK_C;
    }
    1.0 / inv_t - KELVIN
}

/// One centi-degree sample off the thermistor channel, for the heater's
/// averaging loop.
pub fn water_temp_centi(adc: &dyn AnalogPort) -> i32 {
    (adc_to_celsius(adc.read()) * 100.0) as i32
}

/// `"27.5"`-style rendering of a centi-degree value. Values rounded to the
/// heater step always land on an exact tenth.
pub fn format_centi(temp_centi: i32) -> heapless::String<8> {
    let mut s = heapless::String::new();
    let sign = if temp_centi < 0 { "-" } else { "" };
    let a = temp_centi.abs();
    // the buffer fits any i32 centi-degree value, write cannot fail
    let _ = write!(s, "{sign}{}.{}", a / 100, a % 100 / 10);
    s
}

/// Publish the rounded water temperature whenever it changes. Uses the
/// heater's averaged reading so telemetry and thermostat agree.
pub async fn run_telemetry(
    heater: Rc<HeaterController>,
    attribute: &Attribute,
    poll_ms: u32,
    hold_ms: u32,
) {
    let poll = Duration::from_millis(u64::from(poll_ms));
    let hold = Duration::from_millis(u64::from(hold_ms));
    let mut last = None;
    loop {
        let temp = heater.rounded_temperature().await;
        if last != Some(temp) {
            last = Some(temp);
            let text = format_centi(temp);
            debug!("water temperature changed: {text}");
            attribute.publish(text.as_bytes());
            Timer::after(hold).await;
        } else {
            Timer::after(poll).await;
        }
    }
}
