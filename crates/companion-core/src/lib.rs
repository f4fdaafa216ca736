//! Companion Core - offline-first data layer for the companion app.
//!
//! This crate holds everything below the UI:
//! - `store`: durable key-value storage
//! - `cache`: typed cache access and the location acquisition policy
//! - `geo`: contracts for geolocation, permissions and geocoding
//! - `auth` / `api`: the persisted session and the authenticated API client
//! - `refresh`: background refresh of server data into the cache
//! - `startup`: the startup sequence that ties them together
//!
//! UI hosts construct a `StartupOrchestrator`, run it when the home screen
//! mounts, and listen on its report channel for background completion.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod geo;
pub mod models;
pub mod refresh;
pub mod startup;
pub mod store;

pub use api::{ApiClient, ApiError, AuthPolicy};
pub use auth::Session;
pub use cache::{CacheManager, LocationCache, LocationSource, QuickLocation};
pub use config::{Config, Timeouts};
pub use models::{Coordinate, LocationStatus, Region, UserInfo, DEFAULT_LOCATION};
pub use refresh::{DataRefresher, RefreshOutcome};
pub use startup::{BackgroundReport, StartupOrchestrator, StartupOutcome, StartupPhase};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
