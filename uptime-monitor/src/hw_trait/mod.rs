//! Hardware abstraction layer traits.
//!
//! The ADC driver talks to the bus only through the [`I2c`] trait, so the
//! same driver runs against the Linux i2c-dev interface on the host and
//! against a recording mock in tests.

pub mod i2c;
pub mod linux;

#[cfg(test)]
pub(crate) mod mock;

pub use i2c::{I2c, I2cError};
pub use linux::LinuxI2c;

/// Common error type for hardware operations
#[derive(Debug, thiserror::Error)]
pub enum HwError {
    /// Bus-level transaction failure
    #[error(transparent)]
    I2c(#[from] I2cError),
}

pub type Result<T> = std::result::Result<T, HwError>;
