//! Weather service error types.

use std::fmt;

use thiserror::Error;

/// The last thing that went wrong before the retry budget ran out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Upstream answered with a retryable status (429)
    Status(u16),
    /// Timeout, connection reset, refused connection, ...
    Network(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Status(status) => write!(f, "last status {}", status),
            FetchFailure::Network(msg) => write!(f, "last network error: {}", msg),
        }
    }
}

/// Weather provider errors.
///
/// `Clone` so that callers coalesced onto one in-flight fetch can all
/// receive its failure.
#[derive(Debug, Clone, Error)]
pub enum WeatherError {
    #[error("Fetch failed after {attempts} attempts ({last})")]
    FetchExhausted { attempts: u32, last: FetchFailure },

    #[error("Upstream error {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Unknown location: {0}")]
    UnknownLocation(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Weather fetch deadline exceeded")]
    DeadlineExceeded,

    #[error("No cached weather for {0}")]
    NotCached(String),

    #[error("All {total} locations failed")]
    AllLocationsFailed { total: usize },

    #[error("{failed} of {total} locations failed")]
    PartialFailure { failed: usize, total: usize },
}

impl WeatherError {
    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::FetchExhausted { .. } => {
                "The weather service is busy. Please try again in a few minutes."
            }
            Self::Upstream { status, .. } if *status >= 500 => {
                "The weather service is having trouble. Please try again later."
            }
            Self::Upstream { .. } => "Weather data could not be requested.",
            Self::MalformedResponse(_) => "Received unexpected weather data.",
            Self::UnknownLocation(_) => "That resort is not tracked.",
            Self::InvalidRequest(_) => "Weather data could not be requested.",
            Self::DeadlineExceeded => "Weather data took too long to load.",
            Self::NotCached(_) | Self::AllLocationsFailed { .. } => "Weather data unavailable.",
            Self::PartialFailure { .. } => "Weather data is unavailable for some resorts.",
        }
    }

    /// Whether another attempt later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FetchExhausted { .. } | Self::DeadlineExceeded)
    }
}

/// `get_stale` found nothing under the key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no cached entry for {0}")]
pub struct CacheMiss(pub String);

impl From<CacheMiss> for WeatherError {
    fn from(miss: CacheMiss) -> Self {
        WeatherError::NotCached(miss.0)
    }
}
