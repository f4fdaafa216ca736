//! Two-phase location acquisition.
//!
//! `get_quick_location` answers within a fixed deadline using the cache, a
//! fast provider read, or `DEFAULT_LOCATION`, in that order. After first
//! paint, `improve_location_in_background` takes a slow high-accuracy fix
//! and stores it for the next launch.
//!
//! `LocationStatus` is never held here. Callers pass the current status in
//! and receive the next one back, so the "skip refinement once satisfied"
//! rule depends only on what the caller threads through.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use super::keys;
use super::CacheManager;
use crate::config::Timeouts;
use crate::geo::{GeoError, GeolocationProvider, LocationPermissions, PermissionState, PositionOptions};
use crate::models::{LocationStatus, Region, UserLocationsCache, DEFAULT_LOCATION};

/// Where a quick location came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationSource {
    Cache,
    Provider,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuickLocation {
    pub region: Region,
    pub status: LocationStatus,
    pub source: LocationSource,
}

impl QuickLocation {
    fn fallback() -> Self {
        Self {
            region: DEFAULT_LOCATION,
            status: LocationStatus::Error,
            source: LocationSource::Default,
        }
    }
}

#[derive(Clone)]
pub struct LocationCache {
    cache: CacheManager,
    provider: Arc<dyn GeolocationProvider>,
    permissions: Arc<dyn LocationPermissions>,
    timeouts: Timeouts,
}

impl LocationCache {
    pub fn new(
        cache: CacheManager,
        provider: Arc<dyn GeolocationProvider>,
        permissions: Arc<dyn LocationPermissions>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            cache,
            provider,
            permissions,
            timeouts,
        }
    }

    /// Read and deserialize `key`. Missing, unreadable and unparsable entries are all `None`.
    pub async fn load_from_cache<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.cache.load(key).await
    }

    /// Serialize and write `data`. A failed write is logged and otherwise ignored.
    pub async fn save_to_cache<T: Serialize + ?Sized>(&self, key: &str, data: &T) {
        self.cache.save(key, data).await;
    }

    /// Best-effort location for first paint, bounded by the quick-location deadline.
    ///
    /// Never fails. The deadline covers the whole step: the cache read, the
    /// provider read and the cache write of a fresh reading. A cached region
    /// is returned without touching the provider. The losing side of each
    /// race is dropped, so a late reading can never overwrite the cache.
    pub async fn get_quick_location(&self) -> QuickLocation {
        info!("Getting quick location");

        let deadline = self.timeouts.quick_location();
        let started = Instant::now();

        let quick = match timeout(deadline, self.read_quick_location()).await {
            Ok(Ok(quick)) => quick,
            Ok(Err(e)) => {
                warn!(error = %e, "Quick location failed, using default");
                return QuickLocation::fallback();
            }
            Err(_) => {
                info!(deadline_ms = deadline.as_millis() as u64, "Quick location timeout, using default location");
                return QuickLocation::fallback();
            }
        };

        if quick.source == LocationSource::Provider {
            let remaining = deadline.saturating_sub(started.elapsed());
            let save = self.save_to_cache(keys::LAST_KNOWN_LOCATION, &quick.region);
            if timeout(remaining, save).await.is_err() {
                warn!("Caching the quick location did not finish in time");
            }
        }

        quick
    }

    /// Cached region if usable, otherwise a low-accuracy provider read.
    async fn read_quick_location(&self) -> Result<QuickLocation, GeoError> {
        if let Some(cached) = self.load_from_cache::<Region>(keys::LAST_KNOWN_LOCATION).await {
            if cached.is_usable() {
                debug!(lat = cached.latitude, lng = cached.longitude, "Using cached location for quick startup");
                return Ok(QuickLocation {
                    region: cached,
                    status: LocationStatus::Success,
                    source: LocationSource::Cache,
                });
            }
            debug!("Cached location is unusable, asking provider");
        }

        let options = PositionOptions::quick(self.timeouts.quick_provider());
        let position = self.provider.current_position(options).await?;
        let region = Region::around(position.coords);
        info!(lat = region.latitude, lng = region.longitude, "Got fresh location quickly");
        Ok(QuickLocation {
            region,
            status: LocationStatus::Success,
            source: LocationSource::Provider,
        })
    }

    /// Take a fresh high-accuracy fix and store it for the next launch.
    ///
    /// Returns the status that follows `status`. Does nothing at all when
    /// `status` is already `Success`.
    pub async fn improve_location_in_background(&self, status: LocationStatus) -> LocationStatus {
        if status.is_success() {
            debug!("Location already good, skipping background improvement");
            return status;
        }

        info!("Improving location in background");

        if self.permissions.requires_prompt() {
            match self.permissions.request_foreground().await {
                Ok(PermissionState::Granted) => debug!("Location permission granted"),
                Ok(PermissionState::Denied) => {
                    info!("Location permission denied");
                    return LocationStatus::Disabled;
                }
                Err(e) => {
                    warn!(error = %e, "Permission request failed");
                    return status;
                }
            }
        }

        let bound = self.timeouts.refinement();
        let options = PositionOptions::precise(bound);

        match timeout(bound, self.provider.current_position(options)).await {
            Ok(Ok(position)) => {
                let region = Region::around(position.coords);
                info!(lat = region.latitude, lng = region.longitude, "Improved location obtained in background");
                self.save_to_cache(keys::LAST_KNOWN_LOCATION, &region).await;
                LocationStatus::Success
            }
            Ok(Err(GeoError::PermissionDenied)) => {
                info!("Provider reported location permission denied");
                LocationStatus::Disabled
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Background location improvement failed");
                LocationStatus::Error
            }
            Err(_) => {
                warn!(bound_ms = bound.as_millis() as u64, "Background location improvement timed out");
                LocationStatus::Error
            }
        }
    }

    /// Prefetch the last locations listing so the UI has something before the network answers.
    pub async fn load_cached_data_first(&self) -> Option<UserLocationsCache> {
        info!("Loading cached data first");
        let cached = self
            .load_from_cache::<UserLocationsCache>(keys::USER_LOCATIONS_CACHE)
            .await;
        if let Some(ref data) = cached {
            debug!(count = data.locations.len(), "Loaded cached locations");
        }
        cached
    }
}
