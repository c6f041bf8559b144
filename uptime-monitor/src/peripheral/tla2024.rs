//! TLA2024 12-bit, 4-channel ADC driver.
//!
//! The UPS hat wires its four measurement points to the single-ended inputs
//! of a TLA2024. Every sample is taken in single-shot mode: the registers
//! are reset, the channel is triggered, and after a settle delay the
//! conversion register is read back.
//!
//! Datasheet: <https://www.ti.com/lit/ds/symlink/tla2024.pdf>

use tokio::time::{sleep, Duration};

use crate::channel::ChannelConfig;
use crate::hw_trait::{I2c, Result};
use crate::tracing::prelude::*;

/// Addresses selectable with the ADDR jumper on the hat
pub const ADDRESSES: [u8; 3] = [0x48, 0x49, 0x4B];

/// Default I2C address (ADDR tied to GND)
pub const DEFAULT_ADDRESS: u8 = 0x48;

/// Settle delay used by the hat vendor between protocol steps
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(100);

/// One conversion at the default 128 SPS plus 1 ms of margin. Any settle
/// delay shorter than this reads a stale result.
pub const MIN_SETTLE: Duration = Duration::from_micros(1_000_000 / 128 + 1_000);

/// TLA2024 register addresses
mod regs {
    /// Conversion result
    pub const CONVERSION: u8 = 0x00;
    /// Configuration
    pub const CONFIG: u8 = 0x01;
}

/// Config register contents that park the converter idle
const CONFIG_RESET: [u8; 2] = [0x85, 0x83];
/// Cleared conversion register
const CONVERSION_RESET: [u8; 2] = [0x00, 0x00];
/// Low byte written with every trigger: data rate and comparator disabled
const TRIGGER_LSB: u8 = 0x43;

// Fields of the config register's high byte
const OS_START: u8 = 0x80;
const MUX_SHIFT: u8 = 4;
const MUX_MASK: u8 = 0x70;
const PGA_SHIFT: u8 = 1;
const PGA_MASK: u8 = 0x0E;
const MODE_SINGLE_SHOT: u8 = 0x01;

/// Sign bit of a realigned 12-bit conversion code
const CODE_SIGN: u16 = 0x800;

/// Single-ended input selection (MUX[2:0] = 1xx)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    Ain0,
    Ain1,
    Ain2,
    Ain3,
}

impl Input {
    const fn mux(self) -> u8 {
        match self {
            Input::Ain0 => 0b100,
            Input::Ain1 => 0b101,
            Input::Ain2 => 0b110,
            Input::Ain3 => 0b111,
        }
    }

    fn from_mux(mux: u8) -> Option<Self> {
        match mux {
            0b100 => Some(Input::Ain0),
            0b101 => Some(Input::Ain1),
            0b110 => Some(Input::Ain2),
            0b111 => Some(Input::Ain3),
            _ => None,
        }
    }
}

/// Programmable gain setting, expressed as its full-scale range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullScale {
    /// ±6.144 V, lets Vin be measured up to supply + 0.3 V
    Fsr6_144,
    /// ±2.048 V
    Fsr2_048,
}

impl FullScale {
    const fn pga(self) -> u8 {
        match self {
            FullScale::Fsr6_144 => 0b000,
            FullScale::Fsr2_048 => 0b010,
        }
    }

    /// Reference voltage used to scale codes to volts.
    pub const fn volts(self) -> f32 {
        match self {
            FullScale::Fsr6_144 => 6.144,
            FullScale::Fsr2_048 => 2.048,
        }
    }
}

/// Config register high byte that starts a single-shot conversion of `input`.
pub const fn control_byte(input: Input, full_scale: FullScale) -> u8 {
    OS_START | (input.mux() << MUX_SHIFT) | (full_scale.pga() << PGA_SHIFT) | MODE_SINGLE_SHOT
}

/// Why a control byte cannot be used for a single-shot sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFault {
    /// OS or MODE bit clear: the conversion would never start
    NotSingleShot,
    /// MUX selects a differential pair
    NotSingleEnded,
    /// PGA bits disagree with the configured full-scale range
    GainMismatch,
}

impl std::fmt::Display for ControlFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ControlFault::NotSingleShot => "single-shot start and mode bits must both be set",
            ControlFault::NotSingleEnded => "input mux must select a single-ended channel",
            ControlFault::GainMismatch => "PGA bits do not match the configured full-scale range",
        };
        f.write_str(s)
    }
}

/// Decode the input selected by a control byte, checking it against the
/// full-scale range the readings will be scaled with.
pub fn check_control(control: u8, full_scale: FullScale) -> std::result::Result<Input, ControlFault> {
    if control & OS_START == 0 || control & MODE_SINGLE_SHOT == 0 {
        return Err(ControlFault::NotSingleShot);
    }
    let input = Input::from_mux((control & MUX_MASK) >> MUX_SHIFT)
        .ok_or(ControlFault::NotSingleEnded)?;
    if (control & PGA_MASK) >> PGA_SHIFT != full_scale.pga() {
        return Err(ControlFault::GainMismatch);
    }
    Ok(input)
}

/// Extract the 12-bit result from an SMBus word read of the conversion
/// register.
///
/// The chip sends the MSB first but SMBus words are little-endian, so the
/// bytes are swapped; the result is left-justified, so the low nibble is
/// dropped.
pub fn realign(word: u16) -> u16 {
    word.swap_bytes() >> 4
}

/// Scale a conversion code to volts.
///
/// Codes with the sign bit set are a single-ended input sitting just below
/// ground and read as 0 V.
pub fn code_to_volts(code: u16, max_code: f32, reference_voltage: f32) -> f32 {
    if code & CODE_SIGN != 0 {
        return 0.0;
    }
    code as f32 / max_code * reference_voltage
}

/// Scaling applied to every conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub reference_voltage: f32,
    pub max_code: f32,
}

/// TLA2024 driver
pub struct Tla2024<I: I2c> {
    i2c: I,
    address: u8,
    scale: Scale,
    settle: Duration,
}

impl<I: I2c> Tla2024<I> {
    /// Create a new driver at `address`.
    pub fn new(i2c: I, address: u8, scale: Scale, settle: Duration) -> Self {
        Self {
            i2c,
            address,
            scale,
            settle,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Read the config register to check the chip answers at our address.
    pub async fn probe(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[regs::CONFIG], &mut buf)
            .await?;
        let config = u16::from_be_bytes(buf);
        debug!("TLA2024 at 0x{:02X} config register: 0x{:04X}", self.address, config);
        Ok(config)
    }

    /// Take one fresh single-shot sample of `channel` and return it in volts.
    ///
    /// Costs two settle delays. Bus failures are returned as-is; nothing is
    /// retried.
    pub async fn sample(&mut self, channel: &ChannelConfig) -> Result<f32> {
        let code = self.convert(channel.control).await?;
        let volts = code_to_volts(code, self.scale.max_code, self.scale.reference_voltage);
        trace!(
            "{}: control=0x{:02X} code={} volts={:.3}",
            channel.quantity,
            channel.control,
            code,
            volts
        );
        Ok(volts)
    }

    async fn convert(&mut self, control: u8) -> Result<u16> {
        self.write_register(regs::CONFIG, CONFIG_RESET).await?;
        self.write_register(regs::CONVERSION, CONVERSION_RESET).await?;
        sleep(self.settle).await;

        self.write_register(regs::CONFIG, [control, TRIGGER_LSB]).await?;
        sleep(self.settle).await;

        let word = self.read_word(regs::CONVERSION).await?;
        Ok(realign(word))
    }

    // Helper methods for register access

    async fn write_register(&mut self, reg: u8, value: [u8; 2]) -> Result<()> {
        self.i2c.write(self.address, &[reg, value[0], value[1]]).await
    }

    async fn read_word(&mut self, reg: u8) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.i2c.write_read(self.address, &[reg], &mut buf).await?;
        Ok(u16::from_le_bytes(buf))
    }
}
