//! Unit conversion for imported tables. Everything is stored in radians and m/s.

use serde::{Deserialize, Serialize};

const KNOT_MS: f64 = 1852.0 / 3600.0;
const KPH_MS: f64 = 1000.0 / 3600.0;
const MPH_MS: f64 = 1609.344 / 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    Rad,
    #[default]
    Deg,
}

impl AngleUnit {
    pub fn to_radians(self, value: f64) -> f64 {
        match self {
            Self::Rad => value,
            Self::Deg => value.to_radians(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedUnit {
    #[default]
    Knots,
    /// metres per second
    Ms,
    Kph,
    Mph,
}

impl SpeedUnit {
    pub fn to_meters_per_second(self, value: f64) -> f64 {
        match self {
            Self::Knots => value * KNOT_MS,
            Self::Ms => value,
            Self::Kph => value * KPH_MS,
            Self::Mph => value * MPH_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_conversions() {
        assert!((SpeedUnit::Knots.to_meters_per_second(10.0) - 5.1444).abs() < 1e-4);
        assert!((SpeedUnit::Kph.to_meters_per_second(36.0) - 10.0).abs() < 1e-9);
        assert!((SpeedUnit::Mph.to_meters_per_second(10.0) - 4.4704).abs() < 1e-4);
        assert_eq!(SpeedUnit::Ms.to_meters_per_second(3.3), 3.3);
    }

    #[test]
    fn test_units_parse_from_config_names() {
        let unit: SpeedUnit = serde_json::from_str("\"kph\"").unwrap();
        assert_eq!(unit, SpeedUnit::Kph);
        let unit: AngleUnit = serde_json::from_str("\"rad\"").unwrap();
        assert_eq!(unit, AngleUnit::Rad);
        assert!((AngleUnit::Deg.to_radians(180.0) - std::f64::consts::PI).abs() < 1e-12);
    }
}
