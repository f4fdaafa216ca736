use serde::{Deserialize, Serialize};

#[cfg(feature = "ts")]
use ts_rs::TS;

/// Zoom delta used for every region built from a provider reading.
pub const REGION_DELTA: f64 = 0.015;

/// Fallback viewport shown when no better location is available in time.
pub const DEFAULT_LOCATION: Region = Region {
    latitude: 29.6468986,
    longitude: -82.3381134,
    latitude_delta: REGION_DELTA,
    longitude_delta: REGION_DELTA,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

fn default_delta() -> f64 {
    REGION_DELTA
}

/// A map viewport: a coordinate plus zoom deltas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_delta")]
    pub latitude_delta: f64,
    #[serde(default = "default_delta")]
    pub longitude_delta: f64,
}

impl Region {
    /// Build a region around a provider reading with the standard deltas.
    pub fn around(coords: Coordinate) -> Self {
        Self {
            latitude: coords.latitude,
            longitude: coords.longitude,
            latitude_delta: REGION_DELTA,
            longitude_delta: REGION_DELTA,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// A cached region is usable only if both coordinates are real numbers.
    pub fn is_usable(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Session-lifetime state of location acquisition. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum LocationStatus {
    #[default]
    Loading,
    Success,
    Error,
    Disabled,
}

impl LocationStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, LocationStatus::Success)
    }
}

/// Payload of the `userLocationsCache` entry, as returned by the locations listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct UserLocationsCache {
    pub locations: Vec<Coordinate>,
    #[cfg_attr(feature = "ts", ts(type = "Array<Record<string, unknown>>"))]
    pub details: Vec<serde_json::Value>,
}

/// A saved location merged from a listing's coordinate and detail records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct SavedLocation {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

/// Body of an add-location request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct NewLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub location_type: String,
}
