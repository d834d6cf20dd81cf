//! Fetches weather for every tracked resort through the shared cache.
//!
//! Locations are fetched in fixed-size batches. Requests inside a batch are
//! staggered and run concurrently; batches are separated by a pause so the
//! upstream rate limit is not tripped. A location that fails without any
//! cached data is reported as unavailable rather than failing the call.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;

use crate::cache::{Fetched, TtlCache};
use crate::error::WeatherError;
use crate::provider::ForecastSource;
use crate::resorts::{self, RESORTS};
use crate::types::{Location, WeatherSnapshot};

pub const DEFAULT_BATCH_SIZE: usize = 3;
pub const DEFAULT_BATCH_DELAY_MS: u64 = 300;
pub const DEFAULT_REQUEST_STAGGER_MS: u64 = 100;
pub const DEFAULT_FETCH_BUDGET_SECS: u64 = 30;

/// Cache shared between the aggregator and anyone else reading snapshots.
pub type SnapshotCache = TtlCache<String, Arc<WeatherSnapshot>, WeatherError>;

/// Request pacing across locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Concurrent fetches per batch
    pub batch_size: usize,
    /// Pause between the end of one batch and the start of the next
    pub batch_delay: Duration,
    /// Request `k` of a batch starts `k * request_stagger` after the first
    pub request_stagger: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
            request_stagger: Duration::from_millis(DEFAULT_REQUEST_STAGGER_MS),
        }
    }
}

/// What `get_all_weather` does when some locations fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Report failed locations as unavailable; error only if all fail
    #[default]
    BestEffort,
    /// Any failed location fails the whole call
    AllOrNothing,
}

/// Per-location outcome of an aggregate fetch.
#[derive(Debug, Clone)]
pub enum LocationWeather {
    Available(Fetched<Arc<WeatherSnapshot>>),
    Unavailable(WeatherError),
}

impl LocationWeather {
    pub fn snapshot(&self) -> Option<&WeatherSnapshot> {
        match self {
            LocationWeather::Available(fetched) => Some(&fetched.value),
            LocationWeather::Unavailable(_) => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, LocationWeather::Available(fetched) if fetched.stale)
    }
}

/// Weather for every configured location, in configured order.
#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    entries: Vec<(Location, LocationWeather)>,
}

impl AggregateResult {
    pub fn get(&self, name: &str) -> Option<&LocationWeather> {
        self.entries
            .iter()
            .find(|(loc, _)| loc.name == name)
            .map(|(_, weather)| weather)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Location, &LocationWeather)> {
        self.entries.iter().map(|(loc, weather)| (loc, weather))
    }

    pub fn available(&self) -> impl Iterator<Item = (&Location, &Fetched<Arc<WeatherSnapshot>>)> {
        self.entries.iter().filter_map(|(loc, weather)| match weather {
            LocationWeather::Available(fetched) => Some((loc, fetched)),
            LocationWeather::Unavailable(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Location, &WeatherError)> {
        self.entries.iter().filter_map(|(loc, weather)| match weather {
            LocationWeather::Unavailable(err) => Some((loc, err)),
            LocationWeather::Available(_) => None,
        })
    }

    pub fn stale_locations(&self) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|(_, weather)| weather.is_stale())
            .map(|(loc, _)| loc.name)
            .collect()
    }

    pub fn available_count(&self) -> usize {
        self.available().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Entry point for resort weather.
pub struct WeatherAggregator {
    source: Arc<dyn ForecastSource>,
    cache: Arc<SnapshotCache>,
    locations: Vec<Location>,
    ttl: Duration,
    batching: BatchPolicy,
    failure_policy: FailurePolicy,
    fetch_budget: Option<Duration>,
}

impl WeatherAggregator {
    pub fn new(source: Arc<dyn ForecastSource>, cache: Arc<SnapshotCache>) -> Self {
        let ttl = cache.default_ttl();
        Self {
            source,
            cache,
            locations: RESORTS.to_vec(),
            ttl,
            batching: BatchPolicy::default(),
            failure_policy: FailurePolicy::default(),
            fetch_budget: Some(Duration::from_secs(DEFAULT_FETCH_BUDGET_SECS)),
        }
    }

    pub fn with_locations(mut self, locations: Vec<Location>) -> Self {
        self.locations = locations;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_batching(mut self, batching: BatchPolicy) -> Self {
        self.batching = batching;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Overall time limit for one `get_all_weather` / `get_weather` call.
    /// `None` disables it.
    pub fn with_fetch_budget(mut self, budget: Option<Duration>) -> Self {
        self.fetch_budget = budget;
        self
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Weather for a single location.
    pub async fn get_weather(&self, name: &str) -> Result<Fetched<Arc<WeatherSnapshot>>, WeatherError> {
        let location = resorts::find(&self.locations, name)?;
        let deadline = self.fetch_budget.map(|budget| Instant::now() + budget);
        self.fetch_cached(location, deadline).await
    }

    /// Weather for every configured location.
    pub async fn get_all_weather(&self) -> Result<AggregateResult, WeatherError> {
        let started = Instant::now();
        let deadline = self.fetch_budget.map(|budget| started + budget);
        let batch_size = self.batching.batch_size.max(1);
        let batch_count = self.locations.len().div_ceil(batch_size);
        let mut entries = Vec::with_capacity(self.locations.len());

        for (index, batch) in self.locations.chunks(batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.batching.batch_delay).await;
            }
            tracing::debug!(
                "Fetching batch {} of {} ({} locations)",
                index + 1,
                batch_count,
                batch.len()
            );

            let stagger = self.batching.request_stagger;
            let fetches = batch.iter().enumerate().map(move |(k, location)| async move {
                let offset = stagger * k as u32;
                if !offset.is_zero() {
                    tokio::time::sleep(offset).await;
                }
                (*location, self.fetch_cached(*location, deadline).await)
            });

            for (location, result) in join_all(fetches).await {
                let weather = match result {
                    Ok(fetched) => LocationWeather::Available(fetched),
                    Err(e) => {
                        tracing::warn!("Weather unavailable for {}: {}", location.name, e);
                        LocationWeather::Unavailable(e)
                    }
                };
                entries.push((location, weather));
            }
        }

        let result = AggregateResult { entries };
        let total = result.len();
        let failed = result.failed_count();

        if total > 0 && failed == total {
            tracing::error!("Weather unavailable for all {} locations", total);
            return Err(WeatherError::AllLocationsFailed { total });
        }
        if failed > 0 && self.failure_policy == FailurePolicy::AllOrNothing {
            return Err(WeatherError::PartialFailure { failed, total });
        }

        tracing::info!(
            "Weather ready for {} of {} locations in {:?}",
            total - failed,
            total,
            started.elapsed()
        );
        Ok(result)
    }

    async fn fetch_cached(
        &self,
        location: Location,
        deadline: Option<Instant>,
    ) -> Result<Fetched<Arc<WeatherSnapshot>>, WeatherError> {
        let key = location.name.to_string();
        self.cache
            .get_or_fetch(&key, self.ttl, || async move {
                let fetch = self.source.fetch(&location);
                let snapshot = match deadline {
                    Some(deadline) => tokio::time::timeout_at(deadline, fetch)
                        .await
                        .map_err(|_| WeatherError::DeadlineExceeded)??,
                    None => fetch.await?,
                };
                Ok(Arc::new(snapshot))
            })
            .await
    }
}
