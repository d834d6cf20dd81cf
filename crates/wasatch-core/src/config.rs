use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

use wasatch_weather::aggregator::{
    DEFAULT_BATCH_DELAY_MS, DEFAULT_BATCH_SIZE, DEFAULT_FETCH_BUDGET_SECS,
    DEFAULT_REQUEST_STAGGER_MS,
};
use wasatch_weather::provider::{DEFAULT_TIMEZONE, DEFAULT_WINDOW_DAYS};
use wasatch_weather::retry::{
    DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use wasatch_weather::{BatchPolicy, FailurePolicy, RetryPolicy, OPEN_METEO_URL, RESORTS};

/// Directory under the platform config dir holding `config.toml`.
pub const CONFIG_DIR_NAME: &str = "wasatch";
/// Overrides `weather.api_base_url` when set.
pub const API_URL_ENV: &str = "WASATCH_WEATHER_API_URL";

/// Open-Meteo accepts at most 16 forecast days.
const MAX_WINDOW_DAYS: u32 = 16;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Temperature display preference. Data is always stored in °C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    /// The local convention for the resorts we cover
    #[default]
    Fahrenheit,
}

impl TemperatureUnit {
    /// Render a °C value in the preferred unit, rounded to whole degrees.
    pub fn format(self, celsius: f64) -> String {
        match self {
            TemperatureUnit::Celsius => format!("{:.0}°C", celsius),
            TemperatureUnit::Fahrenheit => {
                format!("{:.0}°F", wasatch_weather::units::celsius_to_fahrenheit(celsius))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Forecast API base URL (`/forecast` is appended)
    pub api_base_url: String,

    /// Timezone the provider reports local times in
    pub timezone: String,

    /// Days of data requested before and after today
    pub forecast_window_days: u32,

    /// How long fetched snapshots are served from cache
    pub cache_ttl_minutes: u64,

    pub temperature_unit: TemperatureUnit,

    pub retry: RetrySettings,

    pub batching: BatchSettings,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_base_url: OPEN_METEO_URL.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            forecast_window_days: DEFAULT_WINDOW_DAYS,
            cache_ttl_minutes: 15,
            temperature_unit: TemperatureUnit::Fahrenheit,
            retry: RetrySettings::default(),
            batching: BatchSettings::default(),
        }
    }
}

impl WeatherConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes * 60)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.base_delay_ms)
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub request_stagger_ms: u64,
    /// Overall limit for one refresh of all resorts; 0 disables it
    pub fetch_budget_secs: u64,
    /// Fail the whole refresh when any resort fails
    pub all_or_nothing: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
            request_stagger_ms: DEFAULT_REQUEST_STAGGER_MS,
            fetch_budget_secs: DEFAULT_FETCH_BUDGET_SECS,
            all_or_nothing: false,
        }
    }
}

impl BatchSettings {
    pub fn policy(&self) -> BatchPolicy {
        BatchPolicy {
            batch_size: self.batch_size,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            request_stagger: Duration::from_millis(self.request_stagger_ms),
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        if self.all_or_nothing {
            FailurePolicy::AllOrNothing
        } else {
            FailurePolicy::BestEffort
        }
    }

    pub fn fetch_budget(&self) -> Option<Duration> {
        (self.fetch_budget_secs > 0).then(|| Duration::from_secs(self.fetch_budget_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is not set
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't
    /// exist, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let (mut config, created) = Self::read_or_create(path)?;
        if created {
            tracing::info!("Wrote default config to {}", path.display());
        }
        config.apply_env_overrides();
        Ok(config)
    }

    /// Read `path` as-is, writing defaults there if it doesn't exist.
    ///
    /// Does not log and ignores the environment, so it can run before the
    /// subscriber is installed. The flag is true when the file was created.
    pub fn read_or_create(path: &Path) -> Result<(Self, bool)> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config = toml::from_str(&contents)
                .map_err(ConfigError::from)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            Ok((config, false))
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok((config, true))
        }
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        Self::load_validated_from(&Self::config_path()?)
    }

    pub fn load_validated_from(path: &Path) -> Result<(Self, ValidationResult)> {
        let config = Self::load_from(path)?;
        let validation = config.ensure_valid()?;
        Ok((config, validation))
    }

    /// Validate, failing on errors and logging warnings.
    pub fn ensure_valid(&self) -> Result<ValidationResult> {
        let validation = self.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(validation)
    }

    /// Apply overrides read from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_api_url_override(std::env::var(API_URL_ENV).ok());
    }

    /// Point the weather provider somewhere else (a mirror or a mock server).
    /// Empty values are ignored.
    pub fn apply_api_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.filter(|v| !v.trim().is_empty()) {
            tracing::info!("Using weather API URL from {}: {}", API_URL_ENV, url);
            self.weather.api_base_url = url;
        }
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        let weather = &self.weather;

        Self::validate_url(&weather.api_base_url, "weather.api_base_url", &mut result);

        if weather.timezone.trim().is_empty() {
            result.add_error("weather.timezone", "Timezone must not be empty");
        } else if weather.timezone != DEFAULT_TIMEZONE {
            result.add_warning(
                "weather.timezone",
                format!(
                    "Resorts are in {}; daily totals will follow {} days instead",
                    DEFAULT_TIMEZONE, weather.timezone
                ),
            );
        }

        if weather.forecast_window_days > MAX_WINDOW_DAYS {
            result.add_error(
                "weather.forecast_window_days",
                format!("Forecast window cannot exceed {} days", MAX_WINDOW_DAYS),
            );
        }

        if weather.cache_ttl_minutes == 0 {
            result.add_error("weather.cache_ttl_minutes", "Cache TTL must be greater than 0");
        } else if weather.cache_ttl_minutes > 1440 {
            result.add_warning(
                "weather.cache_ttl_minutes",
                "Cache TTL is more than 24 hours",
            );
        }

        let retry = &weather.retry;
        if retry.max_attempts == 0 {
            result.add_error("weather.retry.max_attempts", "At least one attempt is required");
        }
        if retry.base_delay_ms == 0 {
            result.add_error("weather.retry.base_delay_ms", "Retry delay must be greater than 0");
        } else if retry.max_delay_ms < retry.base_delay_ms {
            result.add_warning(
                "weather.retry.max_delay_ms",
                "Maximum delay is below the base delay; every retry waits the maximum",
            );
        }
        if retry.request_timeout_secs == 0 {
            result.add_error(
                "weather.retry.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }

        let batching = &weather.batching;
        if batching.batch_size == 0 {
            result.add_error("weather.batching.batch_size", "Batch size must be greater than 0");
        } else if batching.batch_size > RESORTS.len() {
            result.add_warning(
                "weather.batching.batch_size",
                format!(
                    "Batch size is larger than the {} tracked resorts",
                    RESORTS.len()
                ),
            );
        }
        if batching.fetch_budget_secs == 0 {
            result.add_warning(
                "weather.batching.fetch_budget_secs",
                "Fetch budget disabled (0 seconds)",
            );
        }

        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.logging.filter) {
            result.add_error("logging.filter", format!("Invalid filter: {}", e));
        }

        result
    }

    /// Validate a URL field
    fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join(CONFIG_DIR_NAME);

        Ok(config_dir.join("config.toml"))
    }
}
