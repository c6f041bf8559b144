//! One sampling cycle's result.

use time::OffsetDateTime;

use crate::evaluator::Classification;

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Wall-clock time of the cycle, local time when the offset is known
    pub timestamp: OffsetDateTime,
    pub vin: f32,
    pub vout: f32,
    pub vbattery: f32,
    /// Calibrated voltage across the thermistor
    pub vtemperature: f32,
    pub temp_c: f32,
    pub temp_f: f32,
    pub classification: Classification,
    /// Input below the brownout floor; informational only
    pub brownout: bool,
}

/// Current time in the local zone, falling back to UTC when the offset
/// cannot be determined.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
