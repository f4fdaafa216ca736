//! Local caching for offline-first startup.
//!
//! - `CacheManager`: typed, best-effort JSON access to the durable store
//! - `LocationCache`: the location acquisition policy built on top of it
//!
//! Cache failures never reach callers; they are logged and treated as a miss.

pub mod location;
pub mod manager;

pub use location::{LocationCache, LocationSource, QuickLocation};
pub use manager::CacheManager;

/// Keys of the persisted state layout.
pub mod keys {
    /// Last region obtained from the provider (`Region`).
    pub const LAST_KNOWN_LOCATION: &str = "lastKnownLocation";
    /// Latest locations listing (`UserLocationsCache`).
    pub const USER_LOCATIONS_CACHE: &str = "userLocationsCache";
    /// Merged, geocoded location list (`Vec<SavedLocation>`).
    pub const SAVED_LOCATIONS: &str = "savedLocations";
    /// Session/token bundle (`UserInfo`).
    pub const USER_INFO: &str = "userInfo";
}
