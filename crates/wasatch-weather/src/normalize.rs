//! Open-Meteo response -> [`WeatherSnapshot`].
//!
//! This is the only place provider field names and provider units are
//! seen. Every value leaves here in canonical units (see [`crate::units`]),
//! converted exactly once.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::error::WeatherError;
use crate::types::{CurrentConditions, DailySeries, HourlySeries, WeatherSnapshot};
use crate::units::{DepthUnit, DistanceUnit, ProviderUnits, TemperatureUnit, WindSpeedUnit};

const HOUR_FORMAT: &str = "%Y-%m-%dT%H:%M";
const DATE_FORMAT: &str = "%Y-%m-%d";

type Series = Option<Vec<Option<f64>>>;

#[derive(Debug, Deserialize)]
struct RawForecast {
    current: Option<RawCurrent>,
    #[serde(default)]
    current_units: HashMap<String, String>,
    hourly: Option<RawHourly>,
    #[serde(default)]
    hourly_units: HashMap<String, String>,
    daily: Option<RawDaily>,
    #[serde(default)]
    daily_units: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawCurrent {
    time: Option<String>,
    temperature_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
    precipitation: Option<f64>,
    relative_humidity_2m: Option<f64>,
    visibility: Option<f64>,
    weather_code: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct RawHourly {
    time: Option<Vec<String>>,
    temperature_2m: Series,
    snowfall: Series,
    wind_speed_10m: Series,
    wind_direction_10m: Series,
    precipitation: Series,
    relative_humidity_2m: Series,
    visibility: Series,
}

#[derive(Debug, Deserialize)]
struct RawDaily {
    time: Option<Vec<String>>,
    snowfall_sum: Series,
    temperature_2m_max: Series,
    temperature_2m_min: Series,
    precipitation_sum: Series,
    wind_speed_10m_max: Series,
}

/// Normalize a response fetched with the default unit request
/// (°C, mph, inches).
pub fn normalize(body: &serde_json::Value) -> Result<WeatherSnapshot, WeatherError> {
    normalize_with(body, &ProviderUnits::default())
}

/// Normalize a response. `requested` is what the request asked for and is
/// only consulted for fields the response's `*_units` blocks do not label.
pub fn normalize_with(
    body: &serde_json::Value,
    requested: &ProviderUnits,
) -> Result<WeatherSnapshot, WeatherError> {
    let raw = RawForecast::deserialize(body)
        .map_err(|e| WeatherError::MalformedResponse(format!("unexpected shape: {}", e)))?;

    let current = raw
        .current
        .ok_or_else(|| missing("current"))
        .and_then(|c| normalize_current(c, &raw.current_units, requested))?;
    let hourly = raw
        .hourly
        .ok_or_else(|| missing("hourly.time"))
        .and_then(|h| normalize_hourly(h, &raw.hourly_units, requested))?;
    let daily = raw
        .daily
        .ok_or_else(|| missing("daily.time"))
        .and_then(|d| normalize_daily(d, &raw.daily_units, requested))?;

    Ok(WeatherSnapshot { current, hourly, daily })
}

fn missing(field: &str) -> WeatherError {
    WeatherError::MalformedResponse(format!("missing required field {}", field))
}

fn normalize_current(
    raw: RawCurrent,
    labels: &HashMap<String, String>,
    requested: &ProviderUnits,
) -> Result<CurrentConditions, WeatherError> {
    let temp = temperature_unit(labels, "temperature_2m", requested)?;
    let apparent = temperature_unit(labels, "apparent_temperature", requested)?;
    let wind = wind_unit(labels, "wind_speed_10m", requested)?;
    let precip = depth_unit(labels, "precipitation", requested.precipitation)?;
    let visibility = distance_unit(labels, "visibility", requested)?;

    let temperature = raw
        .temperature_2m
        .ok_or_else(|| missing("current.temperature_2m"))?;

    let observed_at = raw
        .time
        .as_deref()
        .map(|t| parse_hour(t, "current.time"))
        .transpose()?;

    Ok(CurrentConditions {
        temperature: temp.to_celsius(temperature),
        apparent_temperature: raw.apparent_temperature.map(|v| apparent.to_celsius(v)),
        wind_speed: raw.wind_speed_10m.map(|v| wind.to_mph(v)),
        wind_direction: raw.wind_direction_10m,
        precipitation: raw.precipitation.map(|v| precip.to_inches(v)),
        relative_humidity: raw.relative_humidity_2m,
        visibility: raw.visibility.map(|v| visibility.to_meters(v)),
        weather_code: raw.weather_code,
        observed_at,
    })
}

fn normalize_hourly(
    raw: RawHourly,
    labels: &HashMap<String, String>,
    requested: &ProviderUnits,
) -> Result<HourlySeries, WeatherError> {
    let times = raw.time.ok_or_else(|| missing("hourly.time"))?;
    let time = times
        .iter()
        .map(|t| parse_hour(t, "hourly.time"))
        .collect::<Result<Vec<_>, _>>()?;
    let len = time.len();

    let temp = temperature_unit(labels, "temperature_2m", requested)?;
    let snow = depth_unit(labels, "snowfall", requested.snowfall)?;
    let wind = wind_unit(labels, "wind_speed_10m", requested)?;
    let precip = depth_unit(labels, "precipitation", requested.precipitation)?;
    let visibility = distance_unit(labels, "visibility", requested)?;

    Ok(HourlySeries {
        temperature: aligned(raw.temperature_2m, len, "hourly.temperature_2m", |v| {
            temp.to_celsius(v)
        })?,
        snowfall: aligned(raw.snowfall, len, "hourly.snowfall", |v| snow.to_inches(v))?,
        wind_speed: aligned(raw.wind_speed_10m, len, "hourly.wind_speed_10m", |v| {
            wind.to_mph(v)
        })?,
        wind_direction: aligned(raw.wind_direction_10m, len, "hourly.wind_direction_10m", |v| v)?,
        precipitation: aligned(raw.precipitation, len, "hourly.precipitation", |v| {
            precip.to_inches(v)
        })?,
        relative_humidity: aligned(
            raw.relative_humidity_2m,
            len,
            "hourly.relative_humidity_2m",
            |v| v,
        )?,
        visibility: aligned(raw.visibility, len, "hourly.visibility", |v| {
            visibility.to_meters(v)
        })?,
        time,
    })
}

fn normalize_daily(
    raw: RawDaily,
    labels: &HashMap<String, String>,
    requested: &ProviderUnits,
) -> Result<DailySeries, WeatherError> {
    let dates = raw.time.ok_or_else(|| missing("daily.time"))?;
    let date = dates
        .iter()
        .map(|d| {
            NaiveDate::parse_from_str(d, DATE_FORMAT).map_err(|_| {
                WeatherError::MalformedResponse(format!("bad date in daily.time: {}", d))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let len = date.len();

    let snow = depth_unit(labels, "snowfall_sum", requested.snowfall)?;
    let max = temperature_unit(labels, "temperature_2m_max", requested)?;
    let min = temperature_unit(labels, "temperature_2m_min", requested)?;
    let precip = depth_unit(labels, "precipitation_sum", requested.precipitation)?;
    let wind = wind_unit(labels, "wind_speed_10m_max", requested)?;

    Ok(DailySeries {
        snowfall: aligned(raw.snowfall_sum, len, "daily.snowfall_sum", |v| snow.to_inches(v))?,
        temperature_max: aligned(raw.temperature_2m_max, len, "daily.temperature_2m_max", |v| {
            max.to_celsius(v)
        })?,
        temperature_min: aligned(raw.temperature_2m_min, len, "daily.temperature_2m_min", |v| {
            min.to_celsius(v)
        })?,
        precipitation: aligned(raw.precipitation_sum, len, "daily.precipitation_sum", |v| {
            precip.to_inches(v)
        })?,
        wind_speed_max: aligned(raw.wind_speed_10m_max, len, "daily.wind_speed_10m_max", |v| {
            wind.to_mph(v)
        })?,
        date,
    })
}

/// An absent series becomes all-`None`; a present one must match the time
/// axis exactly.
fn aligned(
    series: Series,
    len: usize,
    field: &str,
    convert: impl Fn(f64) -> f64,
) -> Result<Vec<Option<f64>>, WeatherError> {
    match series {
        None => Ok(vec![None; len]),
        Some(values) if values.len() == len => {
            Ok(values.into_iter().map(|v| v.map(&convert)).collect())
        }
        Some(values) => Err(WeatherError::MalformedResponse(format!(
            "{} has {} values for {} timestamps",
            field,
            values.len(),
            len
        ))),
    }
}

fn parse_hour(value: &str, field: &str) -> Result<NaiveDateTime, WeatherError> {
    NaiveDateTime::parse_from_str(value, HOUR_FORMAT)
        .map_err(|_| WeatherError::MalformedResponse(format!("bad timestamp in {}: {}", field, value)))
}

fn unknown_unit(field: &str, label: &str) -> WeatherError {
    WeatherError::MalformedResponse(format!("unknown unit {:?} for {}", label, field))
}

fn temperature_unit(
    labels: &HashMap<String, String>,
    field: &str,
    requested: &ProviderUnits,
) -> Result<TemperatureUnit, WeatherError> {
    match labels.get(field) {
        Some(label) => TemperatureUnit::from_label(label).ok_or_else(|| unknown_unit(field, label)),
        None => Ok(requested.temperature),
    }
}

fn wind_unit(
    labels: &HashMap<String, String>,
    field: &str,
    requested: &ProviderUnits,
) -> Result<WindSpeedUnit, WeatherError> {
    match labels.get(field) {
        Some(label) => WindSpeedUnit::from_label(label).ok_or_else(|| unknown_unit(field, label)),
        None => Ok(requested.wind_speed),
    }
}

fn depth_unit(
    labels: &HashMap<String, String>,
    field: &str,
    requested: DepthUnit,
) -> Result<DepthUnit, WeatherError> {
    match labels.get(field) {
        Some(label) => DepthUnit::from_label(label).ok_or_else(|| unknown_unit(field, label)),
        None => Ok(requested),
    }
}

fn distance_unit(
    labels: &HashMap<String, String>,
    field: &str,
    requested: &ProviderUnits,
) -> Result<DistanceUnit, WeatherError> {
    match labels.get(field) {
        Some(label) => DistanceUnit::from_label(label).ok_or_else(|| unknown_unit(field, label)),
        None => Ok(requested.visibility),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alta_body() -> serde_json::Value {
        json!({
            "current": { "temperature_2m": -5, "weather_code": 71 },
            "hourly": {
                "time": ["2024-01-01T00:00"],
                "snowfall": [2.5],
                "temperature_2m": [-5]
            },
            "daily": {
                "time": ["2024-01-01"],
                "snowfall_sum": [10],
                "temperature_2m_max": [-2],
                "temperature_2m_min": [-8]
            }
        })
    }

    #[test]
    fn test_alta_scenario_has_no_unit_drift() {
        let snapshot = normalize(&alta_body()).unwrap();

        assert_eq!(snapshot.current.temperature, -5.0);
        assert_eq!(snapshot.current.weather_code, Some(71));
        assert_eq!(snapshot.hourly.snowfall[0], Some(2.5));
        assert_eq!(snapshot.hourly.temperature[0], Some(-5.0));
        assert_eq!(snapshot.daily.snowfall[0], Some(10.0));
        assert_eq!(snapshot.daily.temperature_max[0], Some(-2.0));
        assert_eq!(snapshot.daily.temperature_min[0], Some(-8.0));
        assert_eq!(
            snapshot.daily.date[0],
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_missing_optional_fields_become_none() {
        let snapshot = normalize(&alta_body()).unwrap();

        assert_eq!(snapshot.current.visibility, None);
        assert_eq!(snapshot.current.apparent_temperature, None);
        assert_eq!(snapshot.current.observed_at, None);
        assert_eq!(snapshot.hourly.visibility, vec![None]);
        assert_eq!(snapshot.hourly.wind_speed, vec![None]);
        assert_eq!(snapshot.daily.wind_speed_max, vec![None]);
    }

    #[test]
    fn test_series_stay_aligned_with_time_axis() {
        let body = json!({
            "current": { "temperature_2m": 1.0 },
            "hourly": {
                "time": ["2024-01-01T00:00", "2024-01-01T01:00", "2024-01-01T02:00"],
                "snowfall": [0.1, null, 0.3]
            },
            "daily": { "time": ["2024-01-01", "2024-01-02"] }
        });
        let snapshot = normalize(&body).unwrap();

        let hourly = &snapshot.hourly;
        assert_eq!(hourly.len(), 3);
        for series in [
            &hourly.temperature,
            &hourly.snowfall,
            &hourly.wind_speed,
            &hourly.wind_direction,
            &hourly.precipitation,
            &hourly.relative_humidity,
            &hourly.visibility,
        ] {
            assert_eq!(series.len(), hourly.time.len());
        }
        assert_eq!(hourly.snowfall[1], None);

        let daily = &snapshot.daily;
        for series in [
            &daily.snowfall,
            &daily.temperature_max,
            &daily.temperature_min,
            &daily.precipitation,
            &daily.wind_speed_max,
        ] {
            assert_eq!(series.len(), daily.date.len());
        }
    }

    #[test]
    fn test_misaligned_series_is_malformed() {
        let mut body = alta_body();
        body["hourly"]["snowfall"] = json!([1.0, 2.0]);
        let err = normalize(&body).unwrap_err();
        assert!(matches!(err, WeatherError::MalformedResponse(ref m) if m.contains("hourly.snowfall")));
    }

    #[test]
    fn test_missing_required_fields_are_malformed() {
        let mut no_temp = alta_body();
        no_temp["current"] = json!({ "weather_code": 3 });
        assert!(matches!(
            normalize(&no_temp),
            Err(WeatherError::MalformedResponse(ref m)) if m.contains("current.temperature_2m")
        ));

        let mut no_hourly_time = alta_body();
        no_hourly_time["hourly"] = json!({ "snowfall": [1.0] });
        assert!(matches!(
            normalize(&no_hourly_time),
            Err(WeatherError::MalformedResponse(ref m)) if m.contains("hourly.time")
        ));

        let mut no_daily = alta_body();
        no_daily.as_object_mut().unwrap().remove("daily");
        assert!(matches!(
            normalize(&no_daily),
            Err(WeatherError::MalformedResponse(ref m)) if m.contains("daily.time")
        ));
    }

    #[test]
    fn test_wrong_types_are_malformed() {
        let mut body = alta_body();
        body["current"]["temperature_2m"] = json!("cold");
        assert!(matches!(normalize(&body), Err(WeatherError::MalformedResponse(_))));
    }

    #[test]
    fn test_bad_timestamp_is_malformed() {
        let mut body = alta_body();
        body["hourly"]["time"] = json!(["yesterday"]);
        assert!(matches!(normalize(&body), Err(WeatherError::MalformedResponse(_))));
    }

    #[test]
    fn test_labelled_units_are_converted_once() {
        let body = json!({
            "current": {
                "time": "2024-01-01T09:00",
                "temperature_2m": 23.0,
                "wind_speed_10m": 10.0,
                "precipitation": 25.4
            },
            "current_units": {
                "temperature_2m": "°F",
                "wind_speed_10m": "m/s",
                "precipitation": "mm"
            },
            "hourly": {
                "time": ["2024-01-01T00:00"],
                "snowfall": [2.54],
                "visibility": [1000.0]
            },
            "hourly_units": { "snowfall": "cm", "visibility": "ft" },
            "daily": { "time": ["2024-01-01"], "snowfall_sum": [254.0] },
            "daily_units": { "snowfall_sum": "mm" }
        });
        let snapshot = normalize(&body).unwrap();

        assert!((snapshot.current.temperature - -5.0).abs() < 1e-9);
        assert!((snapshot.current.wind_speed.unwrap() - 22.369).abs() < 0.01);
        assert!((snapshot.current.precipitation.unwrap() - 1.0).abs() < 1e-9);
        assert!((snapshot.hourly.snowfall[0].unwrap() - 1.0).abs() < 1e-9);
        assert!((snapshot.hourly.visibility[0].unwrap() - 304.8).abs() < 1e-9);
        assert!((snapshot.daily.snowfall[0].unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(
            snapshot.current.observed_at,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(9, 0, 0)
        );
    }

    #[test]
    fn test_canonical_labels_are_left_alone() {
        let mut body = alta_body();
        body["hourly_units"] = json!({ "snowfall": "inch", "temperature_2m": "°C" });
        let snapshot = normalize(&body).unwrap();
        assert_eq!(snapshot.hourly.snowfall[0], Some(2.5));
        assert_eq!(snapshot.hourly.temperature[0], Some(-5.0));
    }

    #[test]
    fn test_unknown_unit_label_is_malformed() {
        let mut body = alta_body();
        body["hourly_units"] = json!({ "snowfall": "furlong" });
        assert!(matches!(normalize(&body), Err(WeatherError::MalformedResponse(_))));
    }

    #[test]
    fn test_requested_units_apply_when_unlabelled() {
        let requested = ProviderUnits {
            snowfall: DepthUnit::Cm,
            ..ProviderUnits::default()
        };
        let snapshot = normalize_with(&alta_body(), &requested).unwrap();
        assert!((snapshot.hourly.snowfall[0].unwrap() - 2.5 / 2.54).abs() < 1e-9);
    }
}
