//! Unified error types for the AquaDeck firmware.
//!
//! Follows embedded best practice: a single `Error` enum that every subsystem
//! can convert into, keeping boundary-level error handling uniform. All
//! variants are `Copy` so they can be cheaply passed around without
//! allocation.
//!
//! Most hardware faults in this firmware are deliberately *not* errors: a
//! missed zero-crossing edge or an undetected valve motor start is logged and
//! the operation proceeds (see the relay and valve modules). The variants
//! here cover the reject-at-the-boundary cases: malformed configuration
//! arriving over the wireless channel and invalid heater targets.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A schedule string failed to parse; the previous schedule is retained.
    Schedule(ScheduleError),
    /// A heater target temperature is not a multiple of the rounding step.
    InvalidTarget { target_centi: i32, step: i32 },
    /// A mode attribute held a byte outside the zone's mode enumeration.
    UnknownMode(u8),
    /// An attribute store operation failed.
    Store(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schedule(e) => write!(f, "schedule: {e}"),
            Self::InvalidTarget { target_centi, step } => {
                write!(f, "target {target_centi} centi-deg not a multiple of step {step}")
            }
            Self::UnknownMode(b) => write!(f, "unknown mode byte 0x{b:02X}"),
            Self::Store(msg) => write!(f, "store: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Schedule parse errors
// ---------------------------------------------------------------------------

/// Why a serialized schedule string was rejected.
///
/// The wire format is `start,end,dow,enabled[,config[,heat_mode]]` with all
/// fields decimal (see [`crate::schedule::Schedule`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// Wrong number of comma-separated fields (valid: 4, 5 or 6).
    FieldCount(usize),
    /// A field was not a decimal integer.
    BadNumber,
    /// Start seconds outside `0..=86399`.
    StartOutOfRange(u32),
    /// End seconds outside `0..=86399`.
    EndOutOfRange(u32),
    /// Day-of-week mask wider than 7 bits.
    DayMaskOutOfRange(u32),
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldCount(n) => write!(f, "expected 4-6 fields, got {n}"),
            Self::BadNumber => write!(f, "non-numeric field"),
            Self::StartOutOfRange(v) => write!(f, "start {v} out of range"),
            Self::EndOutOfRange(v) => write!(f, "end {v} out of range"),
            Self::DayMaskOutOfRange(v) => write!(f, "day mask 0x{v:X} wider than 7 bits"),
        }
    }
}

impl From<ScheduleError> for Error {
    fn from(e: ScheduleError) -> Self {
        Self::Schedule(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
