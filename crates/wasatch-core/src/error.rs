//! Application-level error types.
//!
//! Weather errors come from `wasatch_weather`; this module wraps them with
//! configuration and I/O failures and maps everything to messages suitable
//! for display.

use thiserror::Error;
use wasatch_weather::WeatherError;

/// Top-level application error type.
///
/// Use `user_message()` to get a display-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::ParseError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_conversion() {
        let app_err: AppError = WeatherError::DeadlineExceeded.into();
        assert!(matches!(app_err, AppError::Weather(WeatherError::DeadlineExceeded)));

        let app_err: AppError = ConfigError::Invalid("batch_size".into()).into();
        assert!(matches!(app_err, AppError::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_user_message_propagation() {
        let app_err = AppError::Weather(WeatherError::UnknownLocation("Vail".into()));
        assert_eq!(app_err.user_message(), "That resort is not tracked.");

        let app_err = AppError::Config(ConfigError::Invalid("batch_size".into()));
        assert_eq!(app_err.user_message(), "Invalid configuration. Check your settings.");
    }

    #[test]
    fn test_toml_error_becomes_parse_error() {
        let err = toml::from_str::<toml::Value>("[weather").unwrap_err();
        let config_err: ConfigError = err.into();
        assert!(matches!(config_err, ConfigError::ParseError(_)));
        assert!(!config_err.to_string().is_empty());
    }
}
