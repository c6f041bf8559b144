//! Hardware revisions of the UpTime hat.
//!
//! The two 2.0 boards share the ADC and its wiring but differ in the NTC
//! fitted, in the RC filter drop the vendor compensates for, and in the
//! divisor the vendor calibrated raw codes against. Those constants are
//! kept together per board rather than reconciled.

use std::fmt;

use tokio::time::Duration;

use crate::channel::{ChannelConfig, Quantity};
use crate::converter::{Calibration, ThermistorFit};
use crate::peripheral::tla2024::{FullScale, Input};

/// Selectable hardware profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProfileId {
    /// Pi-UpTime UPS 2.0
    #[value(name = "pi-uptime-2")]
    PiUptime2,
    /// Pi-Zero-UpTime 2.0 (14500 cell)
    #[value(name = "pi-zero-uptime-2")]
    PiZeroUptime2,
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().name)
    }
}

/// Every revision-specific constant of one board.
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareProfile {
    pub name: &'static str,
    /// ADC input for each quantity, in sampling order
    pub wiring: [(Quantity, Input); 4],
    pub full_scale: FullScale,
    /// Divisor mapping codes onto the full-scale range
    pub max_code: f32,
    /// Indexed by [`Quantity::index`]
    pub calibration: [Calibration; 4],
    pub thermistor: ThermistorFit,
    /// Pause between sampling cycles
    pub interval: Duration,
}

impl HardwareProfile {
    /// Channel table for this board's wiring at the given gain.
    pub fn channels(&self, full_scale: FullScale) -> [ChannelConfig; 4] {
        self.wiring
            .map(|(quantity, input)| ChannelConfig::new(quantity, input, full_scale))
    }
}

// Both boards wire the battery to AIN1 and the output to AIN2, despite the
// silkscreen labels.
const UPTIME_2_WIRING: [(Quantity, Input); 4] = [
    (Quantity::Vin, Input::Ain0),
    (Quantity::Vbattery, Input::Ain1),
    (Quantity::Vout, Input::Ain2),
    (Quantity::Vtemperature, Input::Ain3),
];

impl ProfileId {
    pub fn profile(self) -> HardwareProfile {
        match self {
            ProfileId::PiUptime2 => HardwareProfile {
                name: "pi-uptime-2",
                wiring: UPTIME_2_WIRING,
                full_scale: FullScale::Fsr6_144,
                max_code: 2047.0,
                calibration: [
                    Calibration::IDENTITY,
                    Calibration::IDENTITY,
                    Calibration::with_offset(0.2),
                    Calibration::IDENTITY,
                ],
                thermistor: ThermistorFit {
                    slope: 0.0408,
                    intercept: 4.236,
                },
                interval: Duration::from_secs(2),
            },
            ProfileId::PiZeroUptime2 => HardwareProfile {
                name: "pi-zero-uptime-2",
                wiring: UPTIME_2_WIRING,
                full_scale: FullScale::Fsr6_144,
                max_code: 2097.0,
                // RC filter drop, measured on every input
                calibration: [Calibration::with_offset(0.08); 4],
                thermistor: ThermistorFit {
                    slope: 0.0432,
                    intercept: 3.95,
                },
                interval: Duration::from_secs(5),
            },
        }
    }
}
