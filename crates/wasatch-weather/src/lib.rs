//! Weather aggregation for the Wasatch resorts
//!
//! Fetches forecasts from the Open-Meteo API with retry and backoff,
//! normalizes them into canonical units, and serves them through an
//! in-memory TTL cache with stale fallback and per-key request coalescing.

pub mod aggregator;
pub mod cache;
pub mod error;
pub mod normalize;
pub mod provider;
pub mod resorts;
pub mod retry;
pub mod summary;
pub mod types;
pub mod units;

pub use aggregator::{
    AggregateResult, BatchPolicy, FailurePolicy, LocationWeather, SnapshotCache, WeatherAggregator,
};
pub use cache::{Fetched, TtlCache, DEFAULT_TTL};
pub use error::{CacheMiss, FetchFailure, WeatherError};
pub use normalize::{normalize, normalize_with};
pub use provider::{ForecastSource, OpenMeteoProvider, OPEN_METEO_URL};
pub use resorts::RESORTS;
pub use retry::{fetch_with_retry, RetryPolicy};
pub use types::*;
