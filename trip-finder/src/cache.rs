//! Caching layer for route service responses.
//!
//! The airport list and per-airport route lists change rarely, so they are
//! cached with a TTL. Fares are passed straight through: they are the one
//! thing a run must see fresh.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use moka::future::Cache as MokaCache;

use crate::domain::{Airport, Flight, Iata};
use crate::routes::{RouteService, ServiceError};

/// Cached airport list. There is only one, so the key is unit.
type AirportsEntry = Arc<Vec<Airport>>;

/// Cached destination list for one origin.
type DestinationsEntry = Arc<Vec<Iata>>;

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached destination lists.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(6 * 60 * 60),
            max_capacity: 1000,
        }
    }
}

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Route service with caching.
///
/// Wraps any [`RouteService`]. Failed lookups are not cached.
pub struct CachedRouteService<S> {
    inner: S,
    airports: MokaCache<(), AirportsEntry>,
    destinations: MokaCache<Iata, DestinationsEntry>,
}

impl<S: RouteService> CachedRouteService<S> {
    /// Create a new cached service.
    pub fn new(inner: S, config: &CacheConfig) -> Self {
        let airports = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(1)
            .build();
        let destinations = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self {
            inner,
            airports,
            destinations,
        }
    }

    /// Access the underlying service for operations that bypass cache.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Invalidate all cached entries.
    pub fn invalidate_cache(&self) {
        self.airports.invalidate_all();
        self.destinations.invalidate_all();
    }
}

impl<S: RouteService> RouteService for CachedRouteService<S> {
    async fn list_airports(&self) -> Result<Vec<Airport>, ServiceError> {
        if let Some(cached) = self.airports.get(&()).await {
            return Ok(cached.as_ref().clone());
        }

        let airports = self.inner.list_airports().await?;
        self.airports.insert((), Arc::new(airports.clone())).await;
        Ok(airports)
    }

    async fn list_destinations(&self, origin: &Iata) -> Result<Vec<Iata>, ServiceError> {
        if let Some(cached) = self.destinations.get(origin).await {
            return Ok(cached.as_ref().clone());
        }

        let destinations = self.inner.list_destinations(origin).await?;
        self.destinations
            .insert(*origin, Arc::new(destinations.clone()))
            .await;
        Ok(destinations)
    }

    async fn list_fares(
        &self,
        origin: &Iata,
        destinations: &[Iata],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Flight>, ServiceError> {
        self.inner.list_fares(origin, destinations, from, to).await
    }
}
