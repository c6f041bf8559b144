//! I2C hardware abstraction trait.

use async_trait::async_trait;
use super::Result;

/// I2C-specific errors
#[derive(Debug, thiserror::Error)]
pub enum I2cError {
    /// No acknowledgment from device
    #[error("No acknowledgment from device at address 0x{0:02x}")]
    NoAck(u8),

    /// Bus could not be opened
    #[error("Cannot open I2C bus {path}: {reason}")]
    Open { path: String, reason: String },

    /// Transfer failed for a reason other than a missing device
    #[error("I2C transfer to 0x{addr:02x} failed: {reason}")]
    Transfer { addr: u8, reason: String },
}

/// I2C bus abstraction
///
/// Register access follows the SMBus conventions the ADC expects: a block
/// write is `write(addr, [reg, data...])` and a word read is
/// `write_read(addr, [reg], [lo, hi])` with a repeated start.
#[async_trait]
pub trait I2c: Send + Sync {
    /// Write data to an I2C device.
    async fn write(&mut self, addr: u8, data: &[u8]) -> Result<()>;

    /// Write data then read from an I2C device (repeated start).
    async fn write_read(&mut self, addr: u8, write: &[u8], read: &mut [u8]) -> Result<()>;
}
