//! Background refresh of server-side data into the cache.
//!
//! Nothing here returns an error to the caller: every failure is logged and
//! reported as an outcome, and the cache keeps its previous contents.

use std::time::Duration;

use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::cache::{keys, CacheManager};
use crate::geo::Geocoder;
use crate::models::{NewLocation, SavedLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No access token; nothing was requested.
    Skipped,
    Refreshed,
    Failed,
}

impl RefreshOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed)
    }
}

#[derive(Clone)]
pub struct DataRefresher {
    api: ApiClient,
    cache: CacheManager,
    bound: Duration,
}

impl DataRefresher {
    pub fn new(api: ApiClient, cache: CacheManager, bound: Duration) -> Self {
        Self { api, cache, bound }
    }

    /// Refresh the locations listing into `userLocationsCache`, bounded by the refresh timeout.
    pub async fn refresh_in_background(&self) -> RefreshOutcome {
        if !self.api.session().is_logged_in().await {
            info!("No auth token, skipping API calls");
            return RefreshOutcome::Skipped;
        }

        info!("Refreshing data in background");

        let outcome = match timeout(self.bound, self.api.list_locations()).await {
            Ok(Ok(listing)) => {
                // A failed cache write does not undo a good response
                if self.cache.save(keys::USER_LOCATIONS_CACHE, &listing).await {
                    info!(count = listing.locations.len(), "Locations refreshed successfully");
                } else {
                    warn!(count = listing.locations.len(), "Locations refreshed but could not be cached");
                }
                RefreshOutcome::Refreshed
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to refresh locations");
                RefreshOutcome::Failed
            }
            Err(_) => {
                warn!(bound_ms = self.bound.as_millis() as u64, "Locations refresh timed out");
                RefreshOutcome::Failed
            }
        };

        let succeeded = usize::from(outcome.succeeded());
        info!("Background refresh completed: {}/1 successful", succeeded);
        outcome
    }

    /// Add a location and, once the server confirms it, refresh the listing.
    pub async fn add_location(&self, location: &NewLocation) -> bool {
        match self.api.add_location(location).await {
            Ok(true) => {
                self.refresh_in_background().await;
                true
            }
            Ok(false) => {
                warn!(name = %location.name, "Server did not confirm the new location");
                false
            }
            Err(e) => {
                warn!(error = %e, "Error adding location");
                false
            }
        }
    }

    /// Fetch the listing, merge it with addresses and store it under `savedLocations`.
    ///
    /// Returns `None` when the listing cannot be fetched or its two halves
    /// do not line up.
    pub async fn fetch_saved_locations(&self, geocoder: &dyn Geocoder) -> Option<Vec<SavedLocation>> {
        let listing = match self.api.list_locations().await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(error = %e, "Exception fetching locations");
                return None;
            }
        };

        if listing.details.len() != listing.locations.len() {
            warn!(
                details = listing.details.len(),
                locations = listing.locations.len(),
                "Location details and coordinates do not line up"
            );
            return None;
        }

        let merged = join_all(listing.details.iter().zip(&listing.locations).map(
            |(detail, coords)| async move {
                let address = geocoder.address_for(*coords).await;
                SavedLocation {
                    id: detail.get("id").and_then(|v| v.as_i64()).unwrap_or_default(),
                    title: detail
                        .get("title")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    description: detail
                        .get("description")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    latitude: coords.latitude,
                    longitude: coords.longitude,
                    address,
                }
            },
        ))
        .await;

        self.cache.remove(keys::SAVED_LOCATIONS).await;
        self.cache.save(keys::SAVED_LOCATIONS, &merged).await;
        debug!(count = merged.len(), "Saved locations merged");
        Some(merged)
    }
}
