//! Errors that end a monitoring run.

use std::io;

use crate::hw_trait::HwError;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// A bus transaction failed. Never retried: readings from a sensor in
    /// an unknown state must not drive the shutdown decision.
    #[error("ADC bus failure: {0}")]
    Bus(#[from] HwError),

    #[error("writing observations failed: {0}")]
    Sink(#[source] io::Error),

    #[error("could not start the shutdown command: {0}")]
    Shutdown(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
