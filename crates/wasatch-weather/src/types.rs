use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::units;

/// Weather condition categories mapped from WMO codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    #[default]
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
}

impl WeatherCondition {
    /// Convert WMO weather code to WeatherCondition
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 | 1 => Self::Clear,
            2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Fog,
            51 | 53 | 55 => Self::Drizzle,
            56 | 57 => Self::Sleet, // Freezing drizzle
            61 | 63 | 80 => Self::Rain,
            65 | 81 | 82 => Self::HeavyRain,
            66 | 67 => Self::Sleet, // Freezing rain
            71 | 73 | 75 | 77 | 85 | 86 => Self::Snow,
            95 | 96 | 99 => Self::Thunderstorm,
            _ => Self::Cloudy, // Unknown codes render as overcast
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Snow => "Snow",
            Self::Sleet => "Sleet",
            Self::Thunderstorm => "Thunderstorm",
        }
    }

    /// Icon name in the site's weather icon set
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Clear => "clear-day",
            Self::PartlyCloudy => "partly-cloudy-day",
            Self::Cloudy => "cloudy",
            Self::Fog => "fog",
            Self::Drizzle => "drizzle",
            Self::Rain | Self::HeavyRain => "rain",
            Self::Snow | Self::Sleet => "snow",
            Self::Thunderstorm => "thunderstorm",
        }
    }
}

/// Detailed WMO code text, e.g. "Slight snow" for 71.
pub fn describe_wmo_code(code: i32) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}

/// A fixed geographic point we track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: u32,
}

/// Current conditions, canonical units (°C, mph, inches, %, meters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub apparent_temperature: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub precipitation: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub visibility: Option<f64>,
    pub weather_code: Option<i32>,
    pub observed_at: Option<NaiveDateTime>,
}

impl CurrentConditions {
    pub fn temperature_f(&self) -> f64 {
        units::celsius_to_fahrenheit(self.temperature)
    }

    pub fn apparent_temperature_f(&self) -> Option<f64> {
        self.apparent_temperature.map(units::celsius_to_fahrenheit)
    }

    /// Condition bucket; a missing code reads as cloudy.
    pub fn condition(&self) -> WeatherCondition {
        self.weather_code
            .map(WeatherCondition::from_wmo_code)
            .unwrap_or_default()
    }
}

/// Hourly series. Every vector is index-aligned with `time`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlySeries {
    pub time: Vec<NaiveDateTime>,
    pub temperature: Vec<Option<f64>>,
    pub snowfall: Vec<Option<f64>>,
    pub wind_speed: Vec<Option<f64>>,
    pub wind_direction: Vec<Option<f64>>,
    pub precipitation: Vec<Option<f64>>,
    pub relative_humidity: Vec<Option<f64>>,
    pub visibility: Vec<Option<f64>>,
}

impl HourlySeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Index of the first hour at or after `at`.
    pub fn position_at_or_after(&self, at: NaiveDateTime) -> Option<usize> {
        self.time.iter().position(|t| *t >= at)
    }
}

/// Daily series. Every vector is index-aligned with `date`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailySeries {
    pub date: Vec<NaiveDate>,
    pub snowfall: Vec<Option<f64>>,
    pub temperature_max: Vec<Option<f64>>,
    pub temperature_min: Vec<Option<f64>>,
    pub precipitation: Vec<Option<f64>>,
    pub wind_speed_max: Vec<Option<f64>>,
}

impl DailySeries {
    pub fn len(&self) -> usize {
        self.date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_empty()
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.date.iter().position(|d| *d == date)
    }
}

/// Normalized weather for one location at one fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub current: CurrentConditions,
    pub hourly: HourlySeries,
    pub daily: DailySeries,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wmo_code_clear() {
        assert_eq!(WeatherCondition::from_wmo_code(0), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_wmo_code(1), WeatherCondition::Clear);
    }

    #[test]
    fn test_wmo_code_partly_cloudy() {
        assert_eq!(WeatherCondition::from_wmo_code(2), WeatherCondition::PartlyCloudy);
    }

    #[test]
    fn test_wmo_code_fog() {
        assert_eq!(WeatherCondition::from_wmo_code(45), WeatherCondition::Fog);
        assert_eq!(WeatherCondition::from_wmo_code(48), WeatherCondition::Fog);
    }

    #[test]
    fn test_wmo_code_rain_buckets() {
        assert_eq!(WeatherCondition::from_wmo_code(61), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_wmo_code(80), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_wmo_code(65), WeatherCondition::HeavyRain);
        assert_eq!(WeatherCondition::from_wmo_code(82), WeatherCondition::HeavyRain);
    }

    #[test]
    fn test_wmo_code_snow() {
        for code in [71, 73, 75, 77, 85, 86] {
            assert_eq!(WeatherCondition::from_wmo_code(code), WeatherCondition::Snow);
        }
    }

    #[test]
    fn test_wmo_code_sleet() {
        for code in [56, 57, 66, 67] {
            assert_eq!(WeatherCondition::from_wmo_code(code), WeatherCondition::Sleet);
        }
    }

    #[test]
    fn test_wmo_code_unknown_defaults_to_cloudy() {
        assert_eq!(WeatherCondition::from_wmo_code(999), WeatherCondition::Cloudy);
        assert_eq!(WeatherCondition::from_wmo_code(-1), WeatherCondition::Cloudy);
    }

    #[test]
    fn test_condition_icon_name() {
        assert_eq!(WeatherCondition::Clear.icon_name(), "clear-day");
        assert_eq!(WeatherCondition::HeavyRain.icon_name(), "rain");
        assert_eq!(WeatherCondition::Snow.icon_name(), "snow");
    }

    #[test]
    fn test_describe_wmo_code() {
        assert_eq!(describe_wmo_code(71), "Slight snow");
        assert_eq!(describe_wmo_code(48), "Depositing rime fog");
        assert_eq!(describe_wmo_code(12), "Unknown");
    }

    #[test]
    fn test_current_conditions_display_helpers() {
        let current = CurrentConditions {
            temperature: -5.0,
            apparent_temperature: Some(-10.0),
            wind_speed: None,
            wind_direction: None,
            precipitation: None,
            relative_humidity: None,
            visibility: None,
            weather_code: None,
            observed_at: None,
        };
        assert!((current.temperature_f() - 23.0).abs() < 1e-9);
        assert_eq!(current.apparent_temperature_f(), Some(14.0));
        assert_eq!(current.condition(), WeatherCondition::Cloudy);
        // display conversion never touches the stored value
        assert_eq!(current.temperature, -5.0);
    }
}
