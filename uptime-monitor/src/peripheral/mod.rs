//! Drivers for the chips on the UPS hat.

pub mod tla2024;

pub use tla2024::Tla2024;
