//! Open-Meteo forecast provider.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use reqwest::Client;
use url::Url;

use crate::error::WeatherError;
use crate::normalize::normalize_with;
use crate::retry::{fetch_with_retry, RetryPolicy};
use crate::types::{Location, WeatherSnapshot};
use crate::units::{DepthUnit, DistanceUnit, ProviderUnits, TemperatureUnit, WindSpeedUnit};

pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1";
pub const DEFAULT_TIMEZONE: &str = "America/Denver";
/// Days of data requested on either side of today.
pub const DEFAULT_WINDOW_DAYS: u32 = 3;

const USER_AGENT: &str = concat!("wasatch-weather/", env!("CARGO_PKG_VERSION"));

const CURRENT_FIELDS: &str = "temperature_2m,apparent_temperature,wind_speed_10m,\
wind_direction_10m,precipitation,relative_humidity_2m,visibility,weather_code";
const HOURLY_FIELDS: &str = "temperature_2m,snowfall,wind_speed_10m,wind_direction_10m,\
precipitation,relative_humidity_2m,visibility";
const DAILY_FIELDS: &str = "snowfall_sum,temperature_2m_max,temperature_2m_min,\
precipitation_sum,wind_speed_10m_max";

/// We always ask Open-Meteo for mph and inches; `precipitation_unit` also
/// governs snowfall, so both depth series arrive in inches.
const REQUESTED_UNITS: ProviderUnits = ProviderUnits {
    temperature: TemperatureUnit::Celsius,
    wind_speed: WindSpeedUnit::Mph,
    precipitation: DepthUnit::Inch,
    snowfall: DepthUnit::Inch,
    visibility: DistanceUnit::Meters,
};

/// Anything that can produce a normalized snapshot for a location.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch(&self, location: &Location) -> Result<WeatherSnapshot, WeatherError>;
}

#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    client: Arc<Client>,
    base_url: Url,
    timezone: String,
    window_days: u32,
    retry: RetryPolicy,
}

impl OpenMeteoProvider {
    /// Provider against `base_url` (e.g. [`OPEN_METEO_URL`] or a mock server).
    pub fn new(base_url: &str) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WeatherError::InvalidRequest(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            base_url: parse_base_url(base_url)?,
            timezone: DEFAULT_TIMEZONE.to_string(),
            window_days: DEFAULT_WINDOW_DAYS,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = days;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Build the forecast request URL for `location`, covering
    /// `today ± window_days`.
    pub fn forecast_url(&self, location: &Location, today: NaiveDate) -> Result<Url, WeatherError> {
        let window = Days::new(u64::from(self.window_days));
        let (start, end) = today
            .checked_sub_days(window)
            .zip(today.checked_add_days(window))
            .ok_or_else(|| WeatherError::InvalidRequest(format!("date window out of range around {}", today)))?;

        let mut url = self
            .base_url
            .join("forecast")
            .map_err(|e| WeatherError::InvalidRequest(e.to_string()))?;

        url.query_pairs_mut()
            .append_pair("latitude", &location.latitude.to_string())
            .append_pair("longitude", &location.longitude.to_string())
            .append_pair("current", CURRENT_FIELDS)
            .append_pair("hourly", HOURLY_FIELDS)
            .append_pair("daily", DAILY_FIELDS)
            .append_pair("timezone", &self.timezone)
            .append_pair("start_date", &start.format("%Y-%m-%d").to_string())
            .append_pair("end_date", &end.format("%Y-%m-%d").to_string())
            .append_pair("wind_speed_unit", REQUESTED_UNITS.wind_speed.query_value())
            .append_pair("precipitation_unit", REQUESTED_UNITS.precipitation.query_value());

        Ok(url)
    }

    /// Fetch and normalize the forecast for one location.
    #[tracing::instrument(skip(self, location), fields(resort = location.name))]
    pub async fn fetch_location(&self, location: &Location) -> Result<WeatherSnapshot, WeatherError> {
        let url = self.forecast_url(location, Utc::now().date_naive())?;
        let body = fetch_with_retry(&self.client, &url, &self.retry).await?;

        let body: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| WeatherError::MalformedResponse(format!("invalid JSON body: {}", e)))?;
        let snapshot = normalize_with(&body, &REQUESTED_UNITS)?;

        tracing::info!(
            "Fetched weather for {}: {} hourly, {} daily values",
            location.name,
            snapshot.hourly.len(),
            snapshot.daily.len()
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl ForecastSource for OpenMeteoProvider {
    async fn fetch(&self, location: &Location) -> Result<WeatherSnapshot, WeatherError> {
        self.fetch_location(location).await
    }
}

/// `Url::join` drops the last path segment unless the base ends in '/'.
fn parse_base_url(base_url: &str) -> Result<Url, WeatherError> {
    let normalized = format!("{}/", base_url.trim_end_matches('/'));
    let url = Url::parse(&normalized)
        .map_err(|e| WeatherError::InvalidRequest(format!("invalid base URL {}: {}", base_url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(WeatherError::InvalidRequest(format!(
            "base URL must use http or https, got: {}",
            url.scheme()
        )));
    }
    Ok(url)
}
