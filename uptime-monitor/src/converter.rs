//! Raw channel voltages to physical quantities.
//!
//! Everything here is pure: no I/O, no state, same inputs same outputs.

/// Per-channel linear correction: `raw * multiplier + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub multiplier: f32,
    pub offset: f32,
}

impl Calibration {
    /// No correction.
    pub const IDENTITY: Calibration = Calibration {
        multiplier: 1.0,
        offset: 0.0,
    };

    pub const fn with_offset(offset: f32) -> Self {
        Self {
            multiplier: 1.0,
            offset,
        }
    }

    pub fn apply(&self, raw: f32) -> f32 {
        apply_calibration(raw, self.multiplier, self.offset)
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Linear fit of the thermistor voltage against board temperature.
///
/// The NTC is treated as linear over the charging range:
/// `V = intercept - slope * T`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermistorFit {
    /// Volts per °C
    pub slope: f32,
    /// Volts at 0 °C
    pub intercept: f32,
}

impl ThermistorFit {
    pub fn celsius(&self, v_temp: f32) -> f32 {
        temperature_celsius(v_temp, self.slope, self.intercept)
    }
}

pub fn apply_calibration(raw_voltage: f32, multiplier: f32, offset: f32) -> f32 {
    raw_voltage * multiplier + offset
}

pub fn temperature_celsius(v_temp: f32, slope: f32, intercept: f32) -> f32 {
    (intercept - v_temp) / slope
}

pub fn celsius_to_fahrenheit(c: f32) -> f32 {
    c * 1.8 + 32.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fahrenheit_fixed_points() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
        assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
    }

    #[test]
    fn test_calibration() {
        assert_eq!(apply_calibration(3.0, 1.0, 0.0), 3.0);
        assert_eq!(apply_calibration(2.0, 2.0, 0.5), 4.5);
        assert!((Calibration::with_offset(0.2).apply(3.4) - 3.6).abs() < 1e-6);
        assert_eq!(Calibration::default().apply(4.2), 4.2);
    }

    #[test]
    fn test_temperature_celsius() {
        // At the intercept voltage the board is at 0 °C
        assert_eq!(temperature_celsius(4.236, 0.0408, 4.236), 0.0);

        let fit = ThermistorFit {
            slope: 0.0408,
            intercept: 4.236,
        };
        let t = fit.celsius(4.236 - 0.0408 * 25.0);
        assert!((t - 25.0).abs() < 1e-3);

        // Higher voltage across the NTC means colder
        assert!(fit.celsius(4.0) < fit.celsius(3.0));
    }

    #[test]
    fn test_temperature_is_deterministic() {
        let a = temperature_celsius(2.9, 0.0432, 3.95);
        let b = temperature_celsius(2.9, 0.0432, 3.95);
        assert_eq!(a.to_bits(), b.to_bits());
    }
}
