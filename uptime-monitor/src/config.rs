//! Startup configuration.
//!
//! Every setting can come from a command-line flag or the matching
//! `UPTIME_*` environment variable. Settings that are not given fall back to
//! the selected hardware profile. The result is one immutable
//! [`MonitorConfig`], validated before any hardware is touched.
//!
//! # Environment Variables
//!
//! - `UPTIME_PROFILE`: `pi-uptime-2` (default) or `pi-zero-uptime-2`
//! - `UPTIME_I2C_BUS`: I2C adapter (default `/dev/i2c-1`)
//! - `UPTIME_ADDRESS`: ADC address, `0x48`, `0x49` or `0x4B`
//! - `UPTIME_INTERVAL_SECS`, `UPTIME_SETTLE_MS`, `UPTIME_GRACE_SECS`
//! - `UPTIME_V_IN_MIN`, `UPTIME_V_BATT_MIN`, `UPTIME_TEMP_MIN`, `UPTIME_TEMP_MAX`
//! - `UPTIME_CALIBRATE`: `quantity=multiplier,offset`, `;`-separated
//! - `UPTIME_FULL_SCALE`, `UPTIME_MAX_CODE`, `UPTIME_THERMISTOR_SLOPE`,
//!   `UPTIME_THERMISTOR_INTERCEPT`: scaling overrides
//! - `UPTIME_SHUTDOWN_DELAY_MINUTES`, `UPTIME_OUTPUT`, `UPTIME_DRY_RUN`

use std::collections::HashSet;

use clap::Parser;
use tokio::time::Duration;

use crate::channel::{ChannelConfig, Quantity};
use crate::converter::{Calibration, ThermistorFit};
use crate::evaluator::Thresholds;
use crate::hw_trait::HwError;
use crate::peripheral::tla2024::{self, ControlFault, FullScale};
use crate::profile::ProfileId;

/// Grace period between firing the shutdown command and exiting
pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);

/// Minutes `shutdown` waits before halting the host
pub const DEFAULT_SHUTDOWN_DELAY_MINUTES: u32 = 2;

/// Startup configuration errors. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("ADC address 0x{0:02X} is not one of 0x48, 0x49, 0x4B")]
    InvalidAddress(u8),

    #[error("no TLA2024 answering at 0x{address:02X} on {bus}: {source}")]
    Unreachable {
        address: u8,
        bus: String,
        #[source]
        source: HwError,
    },

    #[error("{quantity} control byte 0x{control:02X} is unusable: {fault}")]
    Control {
        quantity: Quantity,
        control: u8,
        fault: ControlFault,
    },

    #[error("{0} is wired to more than one channel")]
    DuplicateQuantity(Quantity),

    #[error("two channels sample the same ADC input (control 0x{0:02X})")]
    DuplicateInput(u8),

    #[error("max code must be a positive number, got {0}")]
    MaxCode(f32),

    #[error("thermistor slope must be non-zero and finite, got {0}")]
    ThermistorSlope(f32),

    #[error("settle time {settle:?} is shorter than one conversion ({min:?})")]
    SettleTooShort { settle: Duration, min: Duration },

    #[error("temperature band is empty: min {min} >= max {max}")]
    TemperatureBand { min: f32, max: f32 },

    #[error("{name} must be a finite number, got {value}")]
    NotFinite { name: &'static str, value: f32 },

    #[error("{name} must be a positive duration, got {value} s")]
    InvalidDuration { name: &'static str, value: f64 },
}

/// Gain setting as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FullScaleArg {
    #[value(name = "6.144")]
    Fsr6_144,
    #[value(name = "2.048")]
    Fsr2_048,
}

impl From<FullScaleArg> for FullScale {
    fn from(arg: FullScaleArg) -> Self {
        match arg {
            FullScaleArg::Fsr6_144 => FullScale::Fsr6_144,
            FullScaleArg::Fsr2_048 => FullScale::Fsr2_048,
        }
    }
}

/// Where observations go
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputKind {
    /// Fixed-width table on stdout
    Console,
    /// Structured tracing events (journald when run under systemd)
    Log,
}

/// Battery monitor for the Pi-UpTime UPS hats
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Hardware revision of the hat
    #[arg(long, env = "UPTIME_PROFILE", value_enum, default_value_t = ProfileId::PiUptime2)]
    pub profile: ProfileId,

    /// I2C adapter the hat sits on
    #[arg(long, env = "UPTIME_I2C_BUS", default_value = "/dev/i2c-1")]
    pub i2c_bus: String,

    /// ADC address set by the hat's jumper
    #[arg(long, env = "UPTIME_ADDRESS", value_parser = parse_address, default_value = "0x48")]
    pub address: u8,

    /// ADC full-scale range [default: from profile]
    #[arg(long, env = "UPTIME_FULL_SCALE", value_enum)]
    pub full_scale: Option<FullScaleArg>,

    /// Divisor applied to raw codes [default: from profile]
    #[arg(long, env = "UPTIME_MAX_CODE")]
    pub max_code: Option<f32>,

    /// Thermistor fit slope in volts per °C [default: from profile]
    #[arg(long, env = "UPTIME_THERMISTOR_SLOPE", allow_negative_numbers = true)]
    pub thermistor_slope: Option<f32>,

    /// Thermistor fit intercept in volts [default: from profile]
    #[arg(long, env = "UPTIME_THERMISTOR_INTERCEPT", allow_negative_numbers = true)]
    pub thermistor_intercept: Option<f32>,

    /// Delay after each register reset and trigger, in milliseconds
    #[arg(long, env = "UPTIME_SETTLE_MS", default_value_t = 100)]
    pub settle_ms: u64,

    /// Seconds between sampling cycles [default: from profile]
    #[arg(long, env = "UPTIME_INTERVAL_SECS", allow_negative_numbers = true)]
    pub interval_secs: Option<f64>,

    /// Seconds to wait after requesting shutdown before exiting
    #[arg(long, env = "UPTIME_GRACE_SECS", default_value_t = 2.0, allow_negative_numbers = true)]
    pub grace_secs: f64,

    /// Input voltage below which the supply counts as failed
    #[arg(long, env = "UPTIME_V_IN_MIN", default_value_t = 3.8)]
    pub v_in_min: f32,

    /// Battery voltage that triggers shutdown when input has failed
    #[arg(long, env = "UPTIME_V_BATT_MIN", default_value_t = 3.1)]
    pub v_batt_min: f32,

    /// Lowest board temperature (°C) at which charging is expected
    #[arg(long, env = "UPTIME_TEMP_MIN", default_value_t = 5.0, allow_negative_numbers = true)]
    pub temp_min: f32,

    /// Highest board temperature (°C) at which charging is expected
    #[arg(long, env = "UPTIME_TEMP_MAX", default_value_t = 60.0, allow_negative_numbers = true)]
    pub temp_max: f32,

    /// Per-channel correction, e.g. `vbattery=1.0,0.2` (repeatable)
    #[arg(
        long = "calibrate",
        env = "UPTIME_CALIBRATE",
        value_parser = parse_calibration,
        value_delimiter = ';',
        allow_hyphen_values = true
    )]
    pub calibrate: Vec<(Quantity, Calibration)>,

    /// Minutes `shutdown` waits before halting (0 halts immediately)
    #[arg(long, env = "UPTIME_SHUTDOWN_DELAY_MINUTES", default_value_t = DEFAULT_SHUTDOWN_DELAY_MINUTES)]
    pub shutdown_delay_minutes: u32,

    /// Observation output
    #[arg(long, env = "UPTIME_OUTPUT", value_enum, default_value_t = OutputKind::Console)]
    pub output: OutputKind,

    /// Log the shutdown instead of running it
    #[arg(long, env = "UPTIME_DRY_RUN")]
    pub dry_run: bool,
}

fn parse_address(s: &str) -> Result<u8, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid I2C address '{}': {}", s, e))
}

fn parse_calibration(s: &str) -> Result<(Quantity, Calibration), String> {
    let (quantity, values) = s
        .split_once('=')
        .ok_or_else(|| format!("expected quantity=multiplier,offset, got '{}'", s))?;
    let quantity: Quantity = quantity.trim().parse()?;
    let (multiplier, offset) = values
        .split_once(',')
        .ok_or_else(|| format!("expected multiplier,offset after '=', got '{}'", values))?;
    let multiplier = multiplier
        .trim()
        .parse::<f32>()
        .map_err(|e| format!("bad multiplier '{}': {}", multiplier, e))?;
    let offset = offset
        .trim()
        .parse::<f32>()
        .map_err(|e| format!("bad offset '{}': {}", offset, e))?;
    Ok((quantity, Calibration { multiplier, offset }))
}

fn duration_secs(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    match Duration::try_from_secs_f64(value) {
        Ok(d) if !d.is_zero() => Ok(d),
        _ => Err(ConfigError::InvalidDuration { name, value }),
    }
}

/// Resolved monitor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub profile: ProfileId,
    pub i2c_bus: String,
    pub address: u8,
    pub full_scale: FullScale,
    pub max_code: f32,
    /// In sampling order
    pub channels: [ChannelConfig; 4],
    /// Indexed by [`Quantity::index`]
    pub calibration: [Calibration; 4],
    pub thermistor: ThermistorFit,
    pub thresholds: Thresholds,
    pub settle: Duration,
    pub interval: Duration,
    pub grace: Duration,
    pub shutdown_delay_minutes: u32,
    pub output: OutputKind,
    pub dry_run: bool,
}

impl MonitorConfig {
    /// Defaults for a hardware profile.
    pub fn from_profile(id: ProfileId) -> Self {
        let profile = id.profile();
        Self {
            profile: id,
            i2c_bus: "/dev/i2c-1".to_string(),
            address: tla2024::DEFAULT_ADDRESS,
            full_scale: profile.full_scale,
            max_code: profile.max_code,
            channels: profile.channels(profile.full_scale),
            calibration: profile.calibration,
            thermistor: profile.thermistor,
            thresholds: Thresholds::default(),
            settle: tla2024::DEFAULT_SETTLE,
            interval: profile.interval,
            grace: DEFAULT_GRACE,
            shutdown_delay_minutes: DEFAULT_SHUTDOWN_DELAY_MINUTES,
            output: OutputKind::Console,
            dry_run: false,
        }
    }

    pub fn calibration_for(&self, quantity: Quantity) -> Calibration {
        self.calibration[quantity.index()]
    }

    /// Check the configuration is internally consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !tla2024::ADDRESSES.contains(&self.address) {
            return Err(ConfigError::InvalidAddress(self.address));
        }

        let mut quantities = HashSet::new();
        let mut inputs = HashSet::new();
        for channel in &self.channels {
            let input = tla2024::check_control(channel.control, self.full_scale).map_err(
                |fault| ConfigError::Control {
                    quantity: channel.quantity,
                    control: channel.control,
                    fault,
                },
            )?;
            if !quantities.insert(channel.quantity) {
                return Err(ConfigError::DuplicateQuantity(channel.quantity));
            }
            if !inputs.insert(input) {
                return Err(ConfigError::DuplicateInput(channel.control));
            }
        }

        if !(self.max_code.is_finite() && self.max_code > 0.0) {
            return Err(ConfigError::MaxCode(self.max_code));
        }
        if !(self.thermistor.slope.is_finite() && self.thermistor.slope != 0.0) {
            return Err(ConfigError::ThermistorSlope(self.thermistor.slope));
        }
        if self.settle < tla2024::MIN_SETTLE {
            return Err(ConfigError::SettleTooShort {
                settle: self.settle,
                min: tla2024::MIN_SETTLE,
            });
        }

        let t = &self.thresholds;
        for (name, value) in [
            ("v_in_min", t.v_in_min),
            ("v_batt_min", t.v_batt_min),
            ("temp_min", t.temp_min),
            ("temp_max", t.temp_max),
            ("thermistor intercept", self.thermistor.intercept),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { name, value });
            }
        }
        if t.temp_min >= t.temp_max {
            return Err(ConfigError::TemperatureBand {
                min: t.temp_min,
                max: t.temp_max,
            });
        }
        for c in &self.calibration {
            if !(c.multiplier.is_finite() && c.offset.is_finite()) {
                return Err(ConfigError::NotFinite {
                    name: "calibration",
                    value: if c.multiplier.is_finite() { c.offset } else { c.multiplier },
                });
            }
        }
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidDuration {
                name: "interval",
                value: 0.0,
            });
        }

        Ok(())
    }
}

impl Args {
    /// Resolve flags against the profile defaults and validate the result.
    pub fn into_config(self) -> Result<MonitorConfig, ConfigError> {
        let mut config = MonitorConfig::from_profile(self.profile);

        config.i2c_bus = self.i2c_bus;
        config.address = self.address;
        if let Some(full_scale) = self.full_scale {
            config.full_scale = full_scale.into();
            config.channels = self.profile.profile().channels(config.full_scale);
        }
        if let Some(max_code) = self.max_code {
            config.max_code = max_code;
        }
        if let Some(slope) = self.thermistor_slope {
            config.thermistor.slope = slope;
        }
        if let Some(intercept) = self.thermistor_intercept {
            config.thermistor.intercept = intercept;
        }
        for (quantity, calibration) in self.calibrate {
            config.calibration[quantity.index()] = calibration;
        }
        config.thresholds = Thresholds {
            v_in_min: self.v_in_min,
            v_batt_min: self.v_batt_min,
            temp_min: self.temp_min,
            temp_max: self.temp_max,
        };
        config.settle = Duration::from_millis(self.settle_ms);
        if let Some(secs) = self.interval_secs {
            config.interval = duration_secs("interval", secs)?;
        }
        config.grace = duration_secs("grace", self.grace_secs)?;
        config.shutdown_delay_minutes = self.shutdown_delay_minutes;
        config.output = self.output;
        config.dry_run = self.dry_run;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn parse(args: &[&str]) -> Result<MonitorConfig, ConfigError> {
        let mut argv = vec!["uptime-monitor"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).expect("arguments parse").into_config()
    }

    #[test]
    #[serial]
    fn test_defaults_follow_profile() {
        let config = parse(&[]).unwrap();
        assert_eq!(config, MonitorConfig::from_profile(ProfileId::PiUptime2));
        assert_eq!(config.interval, Duration::from_secs(2));
        assert_eq!(config.settle, Duration::from_millis(100));
        assert_eq!(config.grace, Duration::from_secs(2));

        let zero = parse(&["--profile", "pi-zero-uptime-2"]).unwrap();
        assert_eq!(zero.max_code, 2097.0);
        assert_eq!(zero.interval, Duration::from_secs(5));
    }

    #[test]
    #[serial]
    fn test_overrides() {
        let config = parse(&[
            "--address",
            "0x4b",
            "--full-scale",
            "2.048",
            "--max-code",
            "2048",
            "--interval-secs",
            "0.5",
            "--temp-min",
            "-5",
            "--calibrate",
            "vin=1.02,-0.05",
            "--output",
            "log",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(config.address, 0x4B);
        assert_eq!(config.full_scale, FullScale::Fsr2_048);
        assert_eq!(config.channels[0].control, 0b1100_0101);
        assert_eq!(config.max_code, 2048.0);
        assert_eq!(config.interval, Duration::from_millis(500));
        assert_eq!(config.thresholds.temp_min, -5.0);
        assert_eq!(
            config.calibration_for(Quantity::Vin),
            Calibration {
                multiplier: 1.02,
                offset: -0.05
            }
        );
        // Untouched channels keep the profile's calibration
        assert_eq!(config.calibration_for(Quantity::Vbattery).offset, 0.2);
        assert_eq!(config.output, OutputKind::Log);
        assert!(config.dry_run);
    }

    #[test]
    #[serial]
    fn test_environment_variables() {
        std::env::set_var("UPTIME_ADDRESS", "0x49");
        std::env::set_var("UPTIME_V_BATT_MIN", "3.3");
        let config = parse(&[]);
        std::env::remove_var("UPTIME_ADDRESS");
        std::env::remove_var("UPTIME_V_BATT_MIN");

        let config = config.unwrap();
        assert_eq!(config.address, 0x49);
        assert_eq!(config.thresholds.v_batt_min, 3.3);
    }

    #[test]
    #[serial]
    fn test_rejects_unknown_address() {
        let err = parse(&["--address", "0x4A"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress(0x4A)));
    }

    #[test]
    #[serial]
    fn test_rejects_short_settle() {
        let err = parse(&["--settle-ms", "5"]).unwrap_err();
        assert!(matches!(err, ConfigError::SettleTooShort { .. }));
        assert!(parse(&["--settle-ms", "9"]).is_ok());
    }

    #[test]
    #[serial]
    fn test_rejects_empty_temperature_band() {
        let err = parse(&["--temp-min", "40", "--temp-max", "40"]).unwrap_err();
        assert!(matches!(err, ConfigError::TemperatureBand { .. }));
    }

    #[test]
    #[serial]
    fn test_negative_temperature_band() {
        let config = parse(&["--temp-min", "-20", "--temp-max", "-5"]).unwrap();
        assert_eq!(config.thresholds.temp_min, -20.0);
        assert_eq!(config.thresholds.temp_max, -5.0);
    }

    #[test]
    #[serial]
    fn test_thermistor_fit_overrides() {
        let config = parse(&["--thermistor-slope", "0.05", "--thermistor-intercept", "4.0"]).unwrap();
        assert_eq!(
            config.thermistor,
            ThermistorFit {
                slope: 0.05,
                intercept: 4.0
            }
        );

        let config = parse(&["--profile", "pi-zero-uptime-2", "--thermistor-intercept", "3.9"]).unwrap();
        assert_eq!(config.thermistor.slope, 0.0432);
        assert_eq!(config.thermistor.intercept, 3.9);

        let err = parse(&["--thermistor-slope", "0"]).unwrap_err();
        assert!(matches!(err, ConfigError::ThermistorSlope(_)));
    }

    #[test]
    #[serial]
    fn test_rejects_bad_durations() {
        let err = parse(&["--interval-secs", "0"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { name: "interval", .. }));
        let err = parse(&["--grace-secs", "-1"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { name: "grace", .. }));
    }

    #[test]
    fn test_rejects_gain_mismatch() {
        let mut config = MonitorConfig::from_profile(ProfileId::PiUptime2);
        // Channel bytes built for 6.144 V but scaled as 2.048 V
        config.full_scale = FullScale::Fsr2_048;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Control {
                quantity: Quantity::Vin,
                fault: ControlFault::GainMismatch,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_duplicate_wiring() {
        let mut config = MonitorConfig::from_profile(ProfileId::PiZeroUptime2);
        config.channels[2].quantity = Quantity::Vin;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateQuantity(Quantity::Vin))
        ));

        let mut config = MonitorConfig::from_profile(ProfileId::PiZeroUptime2);
        config.channels[1].control = config.channels[0].control;
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateInput(_))));
    }

    #[test]
    fn test_rejects_degenerate_scaling() {
        let mut config = MonitorConfig::from_profile(ProfileId::PiUptime2);
        config.max_code = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::MaxCode(_))));

        let mut config = MonitorConfig::from_profile(ProfileId::PiUptime2);
        config.thermistor.slope = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::ThermistorSlope(_))));
    }

    #[test]
    fn test_parse_calibration() {
        assert_eq!(
            parse_calibration("vbattery=1,0.2"),
            Ok((
                Quantity::Vbattery,
                Calibration {
                    multiplier: 1.0,
                    offset: 0.2
                }
            ))
        );
        assert!(parse_calibration("vbattery=1").is_err());
        assert!(parse_calibration("vbattery").is_err());
        assert!(parse_calibration("foo=1,0").is_err());
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x48"), Ok(0x48));
        assert_eq!(parse_address("73"), Ok(73));
        assert!(parse_address("0x148").is_err());
    }
}
