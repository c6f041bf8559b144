//! Classification of one cycle's readings against the safety thresholds.
//!
//! Each cycle is judged on its own; there is no hysteresis. Imminent power
//! loss takes precedence over temperature, and temperature only matters
//! while input power is present (the charger is idle otherwise).

use std::fmt;

/// Threshold bounds, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Brownout floor for the input supply
    pub v_in_min: f32,
    /// Battery voltage at which the host must shut down
    pub v_batt_min: f32,
    /// Below this the battery should not be charged
    pub temp_min: f32,
    /// Above this the battery should not be charged
    pub temp_max: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            v_in_min: 3.8,
            v_batt_min: 3.1,
            temp_min: 5.0,
            temp_max: 60.0,
        }
    }
}

/// Outcome of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Normal,
    /// Input present, board too cold to charge
    TooCold,
    /// Input present, board too hot to charge
    TooHot,
    /// Input lost and battery exhausted; the host must shut down
    CriticalShutdown,
}

impl Classification {
    /// Whether the process must stop sampling after this cycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, Classification::CriticalShutdown)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Classification::Normal => "normal",
            Classification::TooCold => "too-cold",
            Classification::TooHot => "too-hot",
            Classification::CriticalShutdown => "critical-shutdown",
        };
        f.write_str(s)
    }
}

impl Thresholds {
    pub fn classify(&self, v_in: f32, v_battery: f32, temp_c: f32) -> Classification {
        if v_in < self.v_in_min && v_battery < self.v_batt_min {
            Classification::CriticalShutdown
        } else if v_in > self.v_in_min && temp_c < self.temp_min {
            Classification::TooCold
        } else if v_in > self.v_in_min && temp_c > self.temp_max {
            Classification::TooHot
        } else {
            Classification::Normal
        }
    }

    /// Input supply below the brownout floor.
    pub fn is_brownout(&self, v_in: f32) -> bool {
        v_in < self.v_in_min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_overrides_temperature() {
        let t = Thresholds::default();
        assert_eq!(t.classify(3.5, 3.0, 70.0), Classification::CriticalShutdown);
        assert_eq!(t.classify(3.5, 3.0, -10.0), Classification::CriticalShutdown);
    }

    #[test]
    fn test_too_cold() {
        let t = Thresholds::default();
        assert_eq!(t.classify(4.5, 3.5, 2.0), Classification::TooCold);
    }

    #[test]
    fn test_too_hot() {
        let t = Thresholds::default();
        assert_eq!(t.classify(5.1, 4.1, 61.0), Classification::TooHot);
    }

    #[test]
    fn test_normal() {
        let t = Thresholds::default();
        assert_eq!(t.classify(4.5, 3.5, 25.0), Classification::Normal);
    }

    #[test]
    fn test_brownout_with_healthy_battery_is_normal() {
        let t = Thresholds::default();
        assert_eq!(t.classify(3.5, 3.5, 25.0), Classification::Normal);
        assert!(t.is_brownout(3.5));
    }

    #[test]
    fn test_temperature_ignored_without_input() {
        let t = Thresholds::default();
        // Charger is idle on battery, so a hot board is not reported
        assert_eq!(t.classify(0.2, 3.9, 75.0), Classification::Normal);
        assert_eq!(t.classify(0.2, 3.9, -5.0), Classification::Normal);
    }

    #[test]
    fn test_boundaries_are_strict() {
        let t = Thresholds::default();
        // Exactly at the floors is neither critical nor temperature-gated
        assert_eq!(t.classify(3.8, 3.0, 70.0), Classification::Normal);
        assert_eq!(t.classify(3.0, 3.1, 25.0), Classification::Normal);
        assert_eq!(t.classify(4.5, 3.5, 5.0), Classification::Normal);
        assert_eq!(t.classify(4.5, 3.5, 60.0), Classification::Normal);
    }

    #[test]
    fn test_only_critical_is_terminal() {
        assert!(Classification::CriticalShutdown.is_terminal());
        assert!(!Classification::TooHot.is_terminal());
        assert!(!Classification::TooCold.is_terminal());
        assert!(!Classification::Normal.is_terminal());
    }
}
