// Place-name to map-coordinate lookup with a TTL cache in front of the geocoder

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::{ApiError, GeocodingApi};
use crate::config::ClientConfig;

pub const PLACE_NOT_FOUND: &str = "Could not find place";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lon: f64,
}

// Geocoders disagree on whether coordinates are JSON numbers or strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCoordinate {
    Number(f64),
    Text(String),
}

impl RawCoordinate {
    pub fn value(&self) -> Option<f64> {
        let value = match self {
            RawCoordinate::Number(n) => *n,
            RawCoordinate::Text(s) => s.trim().parse().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub lat: RawCoordinate,
    pub lon: RawCoordinate,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl PlaceRecord {
    pub fn coordinates(&self) -> Option<LatLng> {
        let lat = self.lat.value().filter(|v| (-90.0..=90.0).contains(v))?;
        let lon = self.lon.value().filter(|v| (-180.0..=180.0).contains(v))?;
        Some(LatLng { lat, lon })
    }
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hit_count: AtomicUsize,
    pub miss_count: AtomicUsize,
    pub expired_count: AtomicUsize,
    pub invalidated_count: AtomicUsize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStatsReport {
    pub items_count: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub expired_count: usize,
    pub invalidated_count: usize,
}

struct CacheEntry {
    coordinates: LatLng,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

// "  New   York " and "new york" share an entry
pub fn create_cache_key(place: &str) -> String {
    place
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub struct CoordinatesCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    stats: CacheStats,
}

impl CoordinatesCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            stats: CacheStats::default(),
        }
    }

    pub fn get(&self, place: &str) -> Option<LatLng> {
        let key = create_cache_key(place);

        let expired = match self.entries.get(&key) {
            Some(entry) if !entry.is_expired(self.ttl) => {
                self.stats.hit_count.fetch_add(1, Ordering::SeqCst);
                return Some(entry.coordinates);
            }
            Some(_) => true,
            None => false,
        };

        if expired
            && self
                .entries
                .remove_if(&key, |_, entry| entry.is_expired(self.ttl))
                .is_some()
        {
            self.stats.expired_count.fetch_add(1, Ordering::SeqCst);
        }
        self.stats.miss_count.fetch_add(1, Ordering::SeqCst);
        None
    }

    pub fn store(&self, place: &str, coordinates: LatLng) {
        self.entries.insert(
            create_cache_key(place),
            CacheEntry {
                coordinates,
                created_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, place: &str) -> bool {
        let removed = self.entries.remove(&create_cache_key(place)).is_some();
        if removed {
            self.stats.invalidated_count.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }

    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.stats
            .invalidated_count
            .fetch_add(count, Ordering::SeqCst);
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            items_count: self.entries.len(),
            hit_count: self.stats.hit_count.load(Ordering::SeqCst),
            miss_count: self.stats.miss_count.load(Ordering::SeqCst),
            expired_count: self.stats.expired_count.load(Ordering::SeqCst),
            invalidated_count: self.stats.invalidated_count.load(Ordering::SeqCst),
        }
    }
}

/// Resolves the searched place to the point the map should center on.
pub struct MapLocator<G: GeocodingApi> {
    api: Arc<G>,
    cache: CoordinatesCache,
    timeout: Duration,
}

impl<G: GeocodingApi> MapLocator<G> {
    pub fn new(api: Arc<G>, config: &ClientConfig) -> Self {
        Self::with_cache(api, CoordinatesCache::new(config.coordinates_ttl()), config.timeout())
    }

    pub fn with_cache(api: Arc<G>, cache: CoordinatesCache, timeout: Duration) -> Self {
        Self {
            api,
            cache,
            timeout,
        }
    }

    pub fn cache(&self) -> &CoordinatesCache {
        &self.cache
    }

    pub async fn locate(&self, place: &str) -> Result<LatLng, ApiError> {
        let place = place.trim();
        if place.is_empty() {
            return Err(ApiError::NotFound(PLACE_NOT_FOUND.to_string()));
        }

        if let Some(coordinates) = self.cache.get(place) {
            debug!("Coordinates for {:?} served from cache", place);
            return Ok(coordinates);
        }

        let records = tokio::time::timeout(self.timeout, self.api.lookup(place))
            .await
            .map_err(|_| ApiError::Timeout(self.timeout.as_millis() as u64))??;

        let first = records.first().ok_or_else(|| {
            debug!("No coordinates found for {:?}", place);
            ApiError::NotFound(PLACE_NOT_FOUND.to_string())
        })?;

        let coordinates = first.coordinates().ok_or_else(|| {
            warn!("Geocoder returned unusable coordinates for {:?}: {:?}", place, first);
            ApiError::MalformedResponse(format!("unusable coordinates for {place}"))
        })?;

        self.cache.store(place, coordinates);
        info!(
            "Map centered on {:?} at ({}, {})",
            place, coordinates.lat, coordinates.lon
        );
        Ok(coordinates)
    }
}
