//! Pool light colour control.
//!
//! Multi-colour pool lights are addressed over their mains feed: a brief
//! power interruption advances the fixture to its next colour, and each
//! manufacturer maps specific interruption lengths to colour presets. The
//! controller therefore drives the light relay with timed off/on pulses; the
//! per-brand tables give the off-pulse length that lands on each colour.
//!
//! Colours use the shared Davey code namespace (0 = black/off .. 9 = fast
//! scroll); brands map those onto their own preset lists.

use core::cell::Cell;
use core::time::Duration;

use async_io_mini::Timer;
use log::{debug, info, warn};

use crate::relays::Relay;

// ---------------------------------------------------------------------------
// Colours and brands
// ---------------------------------------------------------------------------

/// Davey standardised colour codes, the shared namespace across brands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColourCode {
    Black = 0,
    Blue = 1,
    Purple = 2,
    Red = 3,
    Yellow = 4,
    Green = 5,
    Cyan = 6,
    White = 7,
    Slow = 8,
    Fast = 9,
}

impl ColourCode {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Black),
            1 => Some(Self::Blue),
            2 => Some(Self::Purple),
            3 => Some(Self::Red),
            4 => Some(Self::Yellow),
            5 => Some(Self::Green),
            6 => Some(Self::Cyan),
            7 => Some(Self::White),
            8 => Some(Self::Slow),
            9 => Some(Self::Fast),
            _ => None,
        }
    }
}

/// Supported light brands. The brand attribute value `0xFF` is not a brand:
/// it triggers the programming sequence (see [`LightController::setup`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Brand {
    SpaElectric,
    AquaQuip,
}

/// Brand attribute byte that requests the programming sequence.
pub const SETUP_BRAND_BYTE: u8 = 0xFF;

impl Brand {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::SpaElectric),
            1 => Some(Self::AquaQuip),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::SpaElectric => 0,
            Self::AquaQuip => 1,
        }
    }

    pub fn timing(self) -> BrandTiming {
        match self {
            Self::SpaElectric => BrandTiming {
                off_ms: 400,
                on_ms: 120,
                hold_ms: 3_000,
                codes: SPA_ELECTRIC_CODES,
            },
            Self::AquaQuip => BrandTiming {
                off_ms: 400,
                on_ms: 120,
                hold_ms: 1_500,
                codes: AQUA_QUIP_CODES,
            },
        }
    }
}

/// Pulse timing and the colour-addressing table for one brand. The table
/// maps a Davey code to the off-pulse length (ms) that selects it.
#[derive(Debug, Clone, Copy)]
pub struct BrandTiming {
    pub off_ms: u32,
    pub on_ms: u32,
    pub hold_ms: u32,
    pub codes: &'static [(ColourCode, u32)],
}

const SPA_ELECTRIC_CODES: &[(ColourCode, u32)] = &[
    (ColourCode::Blue, 250),
    (ColourCode::Purple, 300),
    (ColourCode::Red, 350),
    (ColourCode::Yellow, 400),
    (ColourCode::Green, 450),
    (ColourCode::Cyan, 500),
    (ColourCode::White, 550),
    (ColourCode::Slow, 600),
    (ColourCode::Fast, 650),
];

const AQUA_QUIP_CODES: &[(ColourCode, u32)] = &[
    (ColourCode::Blue, 160),
    (ColourCode::Cyan, 200),
    (ColourCode::Green, 240),
    (ColourCode::Yellow, 290),
    (ColourCode::Purple, 350),
    (ColourCode::Red, 420),
    (ColourCode::White, 510),
    (ColourCode::Slow, 730),
    (ColourCode::Fast, 870),
];

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct LightController {
    relay: Relay,
    brand: Cell<Brand>,
    timing: Cell<BrandTiming>,
    current: Cell<Option<ColourCode>>,
}

impl LightController {
    pub fn new(relay: Relay, brand: Brand) -> Self {
        Self {
            relay,
            brand: Cell::new(brand),
            timing: Cell::new(brand.timing()),
            current: Cell::new(None),
        }
    }

    /// Custom pulse timing, for bench rigs and tests.
    pub fn with_timing(relay: Relay, brand: Brand, timing: BrandTiming) -> Self {
        Self {
            relay,
            brand: Cell::new(brand),
            timing: Cell::new(timing),
            current: Cell::new(None),
        }
    }

    pub fn brand(&self) -> Brand {
        self.brand.get()
    }

    /// Switch brands. The remembered colour is invalidated; the fixture's
    /// actual preset is unknown until the next `set_colour`.
    pub fn set_brand(&self, brand: Brand) {
        if brand != self.brand.get() {
            info!("light brand changed to {brand:?}");
            self.brand.set(brand);
            self.timing.set(brand.timing());
            self.current.set(None);
        }
    }

    pub fn is_on(&self) -> bool {
        self.relay.is_on()
    }

    pub fn current_colour(&self) -> Option<ColourCode> {
        self.current.get()
    }

    pub async fn on(&self) {
        self.hold_on(self.timing.get().hold_ms).await;
    }

    pub async fn off(&self) {
        self.hold_off(self.timing.get().hold_ms).await;
        self.current.set(None);
    }

    /// Drive the fixture to a colour preset. `Black` or an unmapped code is
    /// a plain turn-on (the fixture resumes its last preset).
    pub async fn set_colour(&self, code: ColourCode) {
        let timing = self.timing.get();
        let Some(&(_, off_ms)) = timing.codes.iter().find(|(c, _)| *c == code) else {
            if code != ColourCode::Black {
                warn!("{:?} has no preset for {code:?}, turning on as-is", self.brand.get());
            }
            self.on().await;
            return;
        };
        debug!("light colour to {code:?} ({off_ms} ms pulse)");
        self.single_switch(Some(off_ms), None).await;
        self.current.set(Some(code));
    }

    /// One addressing pulse: make sure the light is on, interrupt it for
    /// `off_ms`, restore it for `on_ms`. Explicit off-pulses are shortened
    /// to compensate for the relay's ~10 ms pull-in lag.
    pub async fn single_switch(&self, off_ms: Option<u32>, on_ms: Option<u32>) {
        let timing = self.timing.get();
        let off_ms = match off_ms {
            Some(ms) if ms > 20 => ms - 10,
            Some(ms) => ms,
            None => timing.off_ms,
        };
        let on_ms = on_ms.unwrap_or(timing.on_ms);
        if !self.relay.is_on() {
            info!("light is off, turning on first");
            self.hold_on(timing.on_ms).await;
        }
        self.hold_off(off_ms).await;
        self.hold_on(on_ms).await;
    }

    /// The Spa Electric programming sequence: a long blackout enters setting
    /// mode, three slow pulses step through the mode list, one step selects
    /// multi-colour mode and an extra-long pulse saves. Other brands have no
    /// programming sequence.
    pub async fn setup(&self) {
        if self.brand.get() != Brand::SpaElectric {
            debug!("no setup sequence for {:?}", self.brand.get());
            return;
        }
        let hold = self.timing.get().hold_ms;
        debug!("entering light setting mode");
        self.hold_off(30_000).await;
        for _ in 0..3 {
            self.single_switch(Some(12_000), Some(1_000)).await;
        }
        debug!("selecting multi-colour mode");
        self.single_switch(Some(1_000), Some(hold)).await;
        debug!("saving light settings");
        self.single_switch(Some(31_000), Some(hold)).await;
        self.current.set(None);
    }

    async fn hold_on(&self, ms: u32) {
        self.relay.on();
        Timer::after(Duration::from_millis(u64::from(ms))).await;
    }

    async fn hold_off(&self, ms: u32) {
        self.relay.off();
        Timer::after(Duration::from_millis(u64::from(ms))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::OutputPort;
    use core::cell::RefCell;
    use futures_lite::future::block_on;
    use std::rc::Rc;

    /// Records every level transition it is driven through.
    struct RecordingPin {
        level: Cell<bool>,
        edges: RefCell<Vec<bool>>,
    }

    impl RecordingPin {
        fn new() -> Self {
            Self { level: Cell::new(false), edges: RefCell::new(Vec::new()) }
        }
    }

    impl OutputPort for RecordingPin {
        fn set(&self, level: bool) {
            if level != self.level.get() {
                self.edges.borrow_mut().push(level);
            }
            self.level.set(level);
        }

        fn get(&self) -> bool {
            self.level.get()
        }
    }

    const TEST_TIMING: BrandTiming = BrandTiming {
        off_ms: 1,
        on_ms: 1,
        hold_ms: 1,
        codes: &[(ColourCode::Blue, 25), (ColourCode::Red, 1)],
    };

    fn controller() -> (LightController, Rc<RecordingPin>) {
        let pin = Rc::new(RecordingPin::new());
        let relay = Relay::plain("lights", pin.clone());
        let c = LightController::with_timing(relay, Brand::SpaElectric, TEST_TIMING);
        (c, pin)
    }

    #[test]
    fn set_colour_pulses_from_off() {
        let (c, pin) = controller();
        block_on(c.set_colour(ColourCode::Red));
        // off -> on (wake), off/on (addressing pulse)
        assert_eq!(pin.edges.borrow().as_slice(), &[true, false, true]);
        assert_eq!(c.current_colour(), Some(ColourCode::Red));
        assert!(c.is_on());
    }

    #[test]
    fn set_colour_pulses_from_on() {
        let (c, pin) = controller();
        block_on(c.on());
        pin.edges.borrow_mut().clear();
        block_on(c.set_colour(ColourCode::Red));
        assert_eq!(pin.edges.borrow().as_slice(), &[false, true]);
    }

    #[test]
    fn long_off_pulse_is_compensated() {
        let (c, _) = controller();
        block_on(c.on());
        let start = std::time::Instant::now();
        // 25 ms table entry compensates to 15 ms
        block_on(c.set_colour(ColourCode::Blue));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(16)); // 15 off + 1 on
        assert!(elapsed < Duration::from_millis(25));
    }

    #[test]
    fn unmapped_code_just_turns_on() {
        let (c, pin) = controller();
        block_on(c.set_colour(ColourCode::Fast));
        assert_eq!(pin.edges.borrow().as_slice(), &[true]);
        assert_eq!(c.current_colour(), None);
    }

    #[test]
    fn black_turns_on_without_warning_state() {
        let (c, _) = controller();
        block_on(c.set_colour(ColourCode::Black));
        assert!(c.is_on());
        assert_eq!(c.current_colour(), None);
    }

    #[test]
    fn brand_switch_invalidates_colour_memory() {
        let (c, _) = controller();
        block_on(c.set_colour(ColourCode::Red));
        assert!(c.current_colour().is_some());
        c.set_brand(Brand::AquaQuip);
        assert_eq!(c.brand(), Brand::AquaQuip);
        assert_eq!(c.current_colour(), None);
    }

    #[test]
    fn aqua_quip_has_no_setup_sequence() {
        let (c, pin) = controller();
        c.set_brand(Brand::AquaQuip);
        block_on(c.setup());
        assert!(pin.edges.borrow().is_empty());
    }

    #[test]
    fn production_tables_cover_all_selectable_colours() {
        for brand in [Brand::SpaElectric, Brand::AquaQuip] {
            let timing = brand.timing();
            for code in 1..=9u8 {
                let code = ColourCode::from_byte(code).unwrap();
                assert!(
                    timing.codes.iter().any(|(c, _)| *c == code),
                    "{brand:?} missing {code:?}"
                );
            }
            // off-pulse lengths are strictly increasing along the preset list
            let mut last = 0;
            for &(_, ms) in timing.codes {
                assert!(ms > last);
                last = ms;
            }
        }
    }
}
