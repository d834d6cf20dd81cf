use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use wasatch_core::{AppError, Config};
use wasatch_weather::summary::{
    powder_alert, snowfall_leaders, snowfall_next_hours, snowfall_on, NEXT_DAY_HOURS,
    POWDER_ALERT_INCHES,
};
use wasatch_weather::{
    AggregateResult, LocationWeather, OpenMeteoProvider, SnapshotCache, WeatherAggregator,
};

#[tokio::main]
async fn main() -> Result<()> {
    let path = Config::config_path()?;
    let (mut config, created) =
        Config::read_or_create(&path).context("Failed to load configuration")?;
    wasatch_core::init_logging(&config.logging.filter)?;
    if created {
        tracing::info!("Wrote default config to {}", path.display());
    }
    config.apply_env_overrides();
    config.ensure_valid()?;

    let weather = &config.weather;
    let provider = OpenMeteoProvider::new(&weather.api_base_url)?
        .with_timezone(weather.timezone.clone())
        .with_window_days(weather.forecast_window_days)
        .with_retry(weather.retry.policy());
    let cache = Arc::new(SnapshotCache::new(weather.cache_ttl()));
    let aggregator = WeatherAggregator::new(Arc::new(provider), cache)
        .with_batching(weather.batching.policy())
        .with_failure_policy(weather.batching.failure_policy())
        .with_fetch_budget(weather.batching.fetch_budget());

    tracing::info!("Fetching weather for {} resorts", aggregator.locations().len());

    let result = match aggregator.get_all_weather().await {
        Ok(result) => result,
        Err(e) => {
            let e = AppError::from(e);
            tracing::error!("{}", e.user_message());
            return Err(e.into());
        }
    };

    print_report(&config, &result);
    Ok(())
}

/// Local time the snowfall windows start from. Open-Meteo reports
/// `current.time` in the requested timezone, so prefer that over the host clock.
fn report_start(result: &AggregateResult) -> NaiveDateTime {
    result
        .available()
        .find_map(|(_, fetched)| fetched.value.current.observed_at)
        .unwrap_or_else(|| chrono::Local::now().naive_local())
}

fn print_report(config: &Config, result: &AggregateResult) {
    let unit = config.weather.temperature_unit;
    let from = report_start(result);
    let today = from.date();

    println!("Wasatch resort weather ({})", from.format("%a %b %-d, %H:%M"));
    println!();

    for (location, weather) in result.iter() {
        match weather {
            LocationWeather::Available(fetched) => {
                let snapshot = &fetched.value;
                println!(
                    "  {:<12} {:>5}  {:<16} next {}h {:>4.1}\"  today {:>4.1}\"{}",
                    location.name,
                    unit.format(snapshot.current.temperature),
                    snapshot.current.condition().description(),
                    NEXT_DAY_HOURS,
                    snowfall_next_hours(snapshot, from, NEXT_DAY_HOURS),
                    snowfall_on(snapshot, today),
                    if fetched.stale { "  (stale)" } else { "" }
                );
            }
            LocationWeather::Unavailable(e) => {
                println!("  {:<12} unavailable: {}", location.name, e.user_message());
            }
        }
    }

    let leaders = snowfall_leaders(result, from, 3);
    if !leaders.is_empty() {
        println!();
        println!("Most snow in the next {} hours:", NEXT_DAY_HOURS);
        for (rank, report) in leaders.iter().enumerate() {
            println!("  {}. {} {:.1}\"", rank + 1, report.name, report.inches);
        }
    }

    let alerts = powder_alert(result, from, POWDER_ALERT_INCHES);
    if !alerts.is_empty() {
        let names: Vec<_> = alerts.iter().map(|r| r.name).collect();
        println!();
        println!(
            "POWDER ALERT: {}\" or more expected at {}. Check UDOT canyon road conditions before heading up.",
            POWDER_ALERT_INCHES,
            names.join(", ")
        );
    }
}
