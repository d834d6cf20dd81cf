//! Snowfall figures derived from normalized snapshots. All amounts are inches.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::aggregator::AggregateResult;
use crate::types::WeatherSnapshot;
use crate::units::round_tenth;

/// Hours covered by the "next 24 hours" figures.
pub const NEXT_DAY_HOURS: usize = 24;
/// Inches of expected snow that trigger a powder alert.
pub const POWDER_ALERT_INCHES: f64 = 10.0;
/// Daily totals at or below this count as no snow.
pub const TRACE_SNOW_INCHES: f64 = 0.05;

const TIE_EPSILON: f64 = 1e-6;

/// Snow expected over `hours` hourly entries, starting at the hour that
/// contains `from`. Missing values count as zero.
pub fn snowfall_next_hours(snapshot: &WeatherSnapshot, from: NaiveDateTime, hours: usize) -> f64 {
    let hourly = &snapshot.hourly;
    let Some(start) = hourly.position_at_or_after(truncate_to_hour(from)) else {
        return 0.0;
    };

    let total: f64 = hourly
        .snowfall
        .iter()
        .skip(start)
        .take(hours)
        .map(|value| value.unwrap_or(0.0))
        .sum();
    round_tenth(total)
}

/// Daily snowfall total for `date`, 0 when the day is outside the window.
pub fn snowfall_on(snapshot: &WeatherSnapshot, date: NaiveDate) -> f64 {
    snapshot
        .daily
        .index_of(date)
        .and_then(|i| snapshot.daily.snowfall.get(i).copied().flatten())
        .unwrap_or(0.0)
}

/// One day of the snowfall spread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySnow {
    pub date: NaiveDate,
    pub snowfall: f64,
    pub is_today: bool,
    pub is_past: bool,
    pub days_from_today: i64,
    pub has_snowfall: bool,
}

/// Past and forecast daily snowfall around `today`.
pub fn daily_snowfall_spread(snapshot: &WeatherSnapshot, today: NaiveDate) -> Vec<DaySnow> {
    let daily = &snapshot.daily;
    daily
        .date
        .iter()
        .enumerate()
        .map(|(i, &date)| {
            let snowfall = daily.snowfall.get(i).copied().flatten().unwrap_or(0.0);
            let days_from_today = (date - today).num_days();
            DaySnow {
                date,
                snowfall,
                is_today: days_from_today == 0,
                is_past: days_from_today < 0,
                days_from_today,
                has_snowfall: snowfall > TRACE_SNOW_INCHES,
            }
        })
        .collect()
}

/// A location and its expected snow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnowfallReport {
    pub name: &'static str,
    pub inches: f64,
}

fn next_day_totals(aggregate: &AggregateResult, from: NaiveDateTime) -> Vec<SnowfallReport> {
    aggregate
        .available()
        .map(|(location, fetched)| SnowfallReport {
            name: location.name,
            inches: snowfall_next_hours(&fetched.value, from, NEXT_DAY_HOURS),
        })
        .collect()
}

/// Up to `n` available locations with the most snow in the next 24 hours.
/// Locations expecting none are left out; near-equal amounts keep the
/// configured location order.
pub fn snowfall_leaders(aggregate: &AggregateResult, from: NaiveDateTime, n: usize) -> Vec<SnowfallReport> {
    let mut totals: Vec<_> = next_day_totals(aggregate, from)
        .into_iter()
        .filter(|report| report.inches > 0.0)
        .collect();

    // Stable sort, so ties keep configured order.
    totals.sort_by(|a, b| {
        if (a.inches - b.inches).abs() < TIE_EPSILON {
            std::cmp::Ordering::Equal
        } else {
            b.inches.total_cmp(&a.inches)
        }
    });
    totals.truncate(n);
    totals
}

/// Locations expecting at least `threshold` inches in the next 24 hours.
/// A non-empty result means the road-conditions banner should be shown.
pub fn powder_alert(aggregate: &AggregateResult, from: NaiveDateTime, threshold: f64) -> Vec<SnowfallReport> {
    next_day_totals(aggregate, from)
        .into_iter()
        .filter(|report| report.inches >= threshold)
        .collect()
}

fn truncate_to_hour(at: NaiveDateTime) -> NaiveDateTime {
    at.date()
        .and_hms_opt(at.hour(), 0, 0)
        .unwrap_or(at)
}
