//! Monitor daemon for the Pi-UpTime family of UPS hats.
//!
//! The hat reports its input, output, battery and thermistor voltages
//! through a TLA2024 ADC on I2C. This crate samples those channels on a
//! fixed schedule, reports board temperature outside the charging range,
//! and schedules a host shutdown when input power is gone and the battery
//! is nearly flat.
//!
//! ```text
//! Monitor ─► Tla2024 ─► I2c (LinuxI2c | mock)
//!    │          ×4 channels per cycle
//!    ├─► converter (calibration, thermistor fit)
//!    ├─► evaluator (Normal / TooCold / TooHot / CriticalShutdown)
//!    ├─► ObservationSink (console table | tracing)
//!    └─► ShutdownCollaborator (`shutdown -h +N` | dry run)
//! ```

pub mod channel;
pub mod config;
pub mod converter;
pub mod daemon;
pub mod error;
pub mod evaluator;
pub mod hw_trait;
pub mod monitor;
pub mod observation;
pub mod peripheral;
pub mod profile;
pub mod shutdown;
pub mod sink;
pub mod tracing;
