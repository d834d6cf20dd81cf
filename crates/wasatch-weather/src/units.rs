//! Unit conversions and the provider unit labels we understand.
//!
//! Canonical units for stored snapshots:
//!
//! | quantity                         | unit    |
//! |----------------------------------|---------|
//! | temperature                      | °C      |
//! | wind speed                       | mph     |
//! | precipitation, snowfall          | inches  |
//! | visibility                       | meters  |
//!
//! Conversion to canonical happens once, in [`crate::normalize`].

use serde::{Deserialize, Serialize};

const MM_PER_INCH: f64 = 25.4;
const CM_PER_INCH: f64 = 2.54;
const MPH_PER_MS: f64 = 2.236_936;
const MPH_PER_KMH: f64 = 0.621_371;
const MPH_PER_KNOT: f64 = 1.150_779;
const METERS_PER_FOOT: f64 = 0.3048;

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

pub fn mm_to_inches(mm: f64) -> f64 {
    mm / MM_PER_INCH
}

pub fn cm_to_inches(cm: f64) -> f64 {
    cm / CM_PER_INCH
}

pub fn inches_to_mm(inches: f64) -> f64 {
    inches * MM_PER_INCH
}

pub fn ms_to_mph(ms: f64) -> f64 {
    ms * MPH_PER_MS
}

pub fn kmh_to_mph(kmh: f64) -> f64 {
    kmh * MPH_PER_KMH
}

pub fn knots_to_mph(knots: f64) -> f64 {
    knots * MPH_PER_KNOT
}

pub fn feet_to_meters(feet: f64) -> f64 {
    feet * METERS_PER_FOOT
}

/// Round to one decimal place, the precision snowfall is reported at.
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Temperature unit of a value as delivered by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "°C" | "C" | "celsius" => Some(Self::Celsius),
            "°F" | "F" | "fahrenheit" => Some(Self::Fahrenheit),
            _ => None,
        }
    }

    pub fn to_celsius(self, value: f64) -> f64 {
        match self {
            Self::Celsius => value,
            Self::Fahrenheit => fahrenheit_to_celsius(value),
        }
    }
}

/// Wind speed unit as delivered by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WindSpeedUnit {
    Kmh,
    Ms,
    #[default]
    Mph,
    Kn,
}

impl WindSpeedUnit {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "km/h" | "kmh" => Some(Self::Kmh),
            "m/s" | "ms" => Some(Self::Ms),
            "mp/h" | "mph" => Some(Self::Mph),
            "kn" | "kt" => Some(Self::Kn),
            _ => None,
        }
    }

    /// Query parameter value understood by Open-Meteo.
    pub fn query_value(self) -> &'static str {
        match self {
            Self::Kmh => "kmh",
            Self::Ms => "ms",
            Self::Mph => "mph",
            Self::Kn => "kn",
        }
    }

    pub fn to_mph(self, value: f64) -> f64 {
        match self {
            Self::Kmh => kmh_to_mph(value),
            Self::Ms => ms_to_mph(value),
            Self::Mph => value,
            Self::Kn => knots_to_mph(value),
        }
    }
}

/// Depth unit for precipitation and snowfall as delivered by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DepthUnit {
    Mm,
    Cm,
    #[default]
    Inch,
}

impl DepthUnit {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "mm" => Some(Self::Mm),
            "cm" => Some(Self::Cm),
            "inch" | "in" | "\"" => Some(Self::Inch),
            _ => None,
        }
    }

    pub fn query_value(self) -> &'static str {
        match self {
            Self::Mm => "mm",
            Self::Cm => "cm",
            Self::Inch => "inch",
        }
    }

    pub fn to_inches(self, value: f64) -> f64 {
        match self {
            Self::Mm => mm_to_inches(value),
            Self::Cm => cm_to_inches(value),
            Self::Inch => value,
        }
    }
}

/// Distance unit for visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    #[default]
    Meters,
    Feet,
}

impl DistanceUnit {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "m" => Some(Self::Meters),
            "ft" => Some(Self::Feet),
            _ => None,
        }
    }

    pub fn to_meters(self, value: f64) -> f64 {
        match self {
            Self::Meters => value,
            Self::Feet => feet_to_meters(value),
        }
    }
}

/// Units the provider was asked for. The normalizer assumes these whenever
/// a response omits its `*_units` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProviderUnits {
    pub temperature: TemperatureUnit,
    pub wind_speed: WindSpeedUnit,
    pub precipitation: DepthUnit,
    pub snowfall: DepthUnit,
    pub visibility: DistanceUnit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_fahrenheit_round_trip() {
        let mut c = -60.0;
        while c <= 60.0 {
            let f = celsius_to_fahrenheit(c);
            let back = celsius_to_fahrenheit(fahrenheit_to_celsius(f));
            assert!(approx(back, f), "round trip drifted at {c}: {back} vs {f}");
            assert!(approx(fahrenheit_to_celsius(f), c));
            c += 0.37;
        }
    }

    #[test]
    fn test_known_temperatures() {
        assert!(approx(celsius_to_fahrenheit(0.0), 32.0));
        assert!(approx(celsius_to_fahrenheit(-40.0), -40.0));
        assert!(approx(fahrenheit_to_celsius(212.0), 100.0));
    }

    #[test]
    fn test_depth_conversions() {
        assert!(approx(mm_to_inches(25.4), 1.0));
        assert!(approx(cm_to_inches(2.54), 1.0));
        assert!(approx(inches_to_mm(mm_to_inches(10.0)), 10.0));
        assert!(approx(DepthUnit::Inch.to_inches(2.5), 2.5));
        // cm and mm must not be confused
        assert!(approx(DepthUnit::Cm.to_inches(10.0), 3.937));
        assert!(approx(DepthUnit::Mm.to_inches(10.0), 0.3937));
    }

    #[test]
    fn test_wind_conversions() {
        assert!(approx(WindSpeedUnit::Ms.to_mph(10.0), 22.369));
        assert!(approx(WindSpeedUnit::Kmh.to_mph(100.0), 62.137));
        assert!(approx(WindSpeedUnit::Kn.to_mph(10.0), 11.508));
        assert!(approx(WindSpeedUnit::Mph.to_mph(15.0), 15.0));
    }

    #[test]
    fn test_labels() {
        assert_eq!(TemperatureUnit::from_label("°F"), Some(TemperatureUnit::Fahrenheit));
        assert_eq!(WindSpeedUnit::from_label("mp/h"), Some(WindSpeedUnit::Mph));
        assert_eq!(WindSpeedUnit::from_label("km/h"), Some(WindSpeedUnit::Kmh));
        assert_eq!(DepthUnit::from_label("cm"), Some(DepthUnit::Cm));
        assert_eq!(DepthUnit::from_label("inch"), Some(DepthUnit::Inch));
        assert_eq!(DistanceUnit::from_label("ft"), Some(DistanceUnit::Feet));
        assert_eq!(DepthUnit::from_label("furlong"), None);
    }

    #[test]
    fn test_round_tenth() {
        assert_eq!(round_tenth(1.26), 1.3);
        assert_eq!(round_tenth(0.04), 0.0);
    }
}
