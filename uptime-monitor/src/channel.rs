//! Acquisition channels and the quantities they measure.

use std::fmt;

use crate::peripheral::tla2024::{self, FullScale, Input};

/// Physical quantity wired to an ADC input on the hat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    /// Input supply voltage
    Vin,
    /// Regulated output to the host
    Vout,
    /// Battery terminal voltage
    Vbattery,
    /// Voltage across the NTC thermistor
    Vtemperature,
}

impl Quantity {
    pub const ALL: [Quantity; 4] = [
        Quantity::Vin,
        Quantity::Vout,
        Quantity::Vbattery,
        Quantity::Vtemperature,
    ];

    /// Slot of this quantity in per-quantity arrays.
    pub const fn index(self) -> usize {
        match self {
            Quantity::Vin => 0,
            Quantity::Vout => 1,
            Quantity::Vbattery => 2,
            Quantity::Vtemperature => 3,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Quantity::Vin => "Vin",
            Quantity::Vout => "Vout",
            Quantity::Vbattery => "Vbattery",
            Quantity::Vtemperature => "Vtemperature",
        };
        f.write_str(label)
    }
}

/// One fixed acquisition channel: the config-register byte that selects and
/// triggers it, and what it measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub quantity: Quantity,
    pub control: u8,
}

impl ChannelConfig {
    pub const fn new(quantity: Quantity, input: Input, full_scale: FullScale) -> Self {
        Self {
            quantity,
            control: tla2024::control_byte(input, full_scale),
        }
    }
}

impl std::str::FromStr for Quantity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vin" => Ok(Quantity::Vin),
            "vout" => Ok(Quantity::Vout),
            "vbattery" | "vbatt" | "battery" => Ok(Quantity::Vbattery),
            "vtemperature" | "vtemp" | "temperature" => Ok(Quantity::Vtemperature),
            other => Err(format!(
                "unknown quantity '{}', expected vin, vout, vbattery or vtemperature",
                other
            )),
        }
    }
}
