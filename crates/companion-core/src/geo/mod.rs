//! Contracts for the device-facing location collaborators.
//!
//! The core never talks to platform APIs directly. Hosts supply:
//! - a `GeolocationProvider` that produces position readings
//! - a `LocationPermissions` gate for the runtime permission prompt
//! - a `Geocoder` for place suggestions and reverse geocoding

pub mod fixed;
pub mod google;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Coordinate;

pub use fixed::{FixedPositionProvider, NoPrompt};
pub use google::GooglePlaces;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position unavailable: {0}")]
    Unavailable(String),

    #[error("Position request timed out")]
    Timeout,

    #[error("Permission prompt failed: {0}")]
    PromptFailed(String),
}

/// Accuracy/latency tier of a position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    /// Provider-side bound; the caller may enforce its own deadline on top.
    pub timeout: Duration,
    /// Oldest cached fix the provider may return. Zero forces a fresh fix.
    pub maximum_age: Duration,
}

impl PositionOptions {
    /// Fast, low-accuracy read used for the startup location.
    pub fn quick(timeout: Duration) -> Self {
        Self {
            enable_high_accuracy: false,
            timeout,
            maximum_age: Duration::from_secs(60),
        }
    }

    /// Slow, high-accuracy read that never reuses a cached fix.
    pub fn precise(timeout: Duration) -> Self {
        Self {
            enable_high_accuracy: true,
            timeout,
            maximum_age: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub coords: Coordinate,
}

/// Produces position readings. A call may fail, or never resolve at all.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn current_position(&self, options: PositionOptions) -> Result<Position, GeoError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
}

#[async_trait]
pub trait LocationPermissions: Send + Sync {
    /// Whether this platform needs an explicit runtime grant before a precise read.
    fn requires_prompt(&self) -> bool;

    async fn request_foreground(&self) -> Result<PermissionState, GeoError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceSuggestion {
    pub description: String,
    pub place_id: String,
    pub main_text: String,
    pub secondary_text: String,
}

/// Opaque place-search and reverse-geocoding provider.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Autocomplete suggestions. Failures yield an empty list.
    async fn suggestions(&self, input: &str) -> Vec<PlaceSuggestion>;

    /// Human-readable address for a coordinate, if one can be resolved.
    async fn address_for(&self, coords: Coordinate) -> Option<String>;
}
