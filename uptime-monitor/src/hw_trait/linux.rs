//! I2C over the Linux i2c-dev character device.

use async_trait::async_trait;
use i2cdev::core::{I2CMessage, I2CTransfer};
use i2cdev::linux::{LinuxI2CBus, LinuxI2CError, LinuxI2CMessage};

use super::i2c::{I2c, I2cError};
use super::Result;
use crate::tracing::prelude::*;

// errno values the kernel adapters report when nobody ACKs the address
const ENXIO: i32 = 6;
const EREMOTEIO: i32 = 121;

/// An open `/dev/i2c-N` adapter.
///
/// Transfers are issued as one combined `I2C_RDWR` ioctl, so a write-read
/// uses a repeated start exactly like an SMBus word read. The ioctl blocks
/// the calling thread for the length of the transfer; at 100 kHz that is
/// well under a millisecond for the transactions the monitor issues.
pub struct LinuxI2c {
    bus: LinuxI2CBus,
}

impl LinuxI2c {
    /// Open the adapter at `path` (e.g. `/dev/i2c-1`).
    pub fn open(path: &str) -> Result<Self> {
        let bus = LinuxI2CBus::new(path).map_err(|e| I2cError::Open {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        debug!(path, "Opened I2C bus");
        Ok(Self { bus })
    }
}

fn transfer_error(addr: u8, err: LinuxI2CError) -> I2cError {
    let err = std::io::Error::from(err);
    match err.raw_os_error() {
        Some(ENXIO) | Some(EREMOTEIO) => I2cError::NoAck(addr),
        _ => I2cError::Transfer {
            addr,
            reason: err.to_string(),
        },
    }
}

#[async_trait]
impl I2c for LinuxI2c {
    async fn write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        trace!(addr = %format!("0x{:02x}", addr), data = ?data, "i2c write");
        let mut msgs = [LinuxI2CMessage::write(data).with_address(addr.into())];
        self.bus
            .transfer(&mut msgs)
            .map_err(|e| transfer_error(addr, e))?;
        Ok(())
    }

    async fn write_read(&mut self, addr: u8, write: &[u8], read: &mut [u8]) -> Result<()> {
        {
            let mut msgs = [
                LinuxI2CMessage::write(write).with_address(addr.into()),
                LinuxI2CMessage::read(read).with_address(addr.into()),
            ];
            self.bus
                .transfer(&mut msgs)
                .map_err(|e| transfer_error(addr, e))?;
        }
        trace!(addr = %format!("0x{:02x}", addr), write = ?write, read = ?read, "i2c write_read");
        Ok(())
    }
}
