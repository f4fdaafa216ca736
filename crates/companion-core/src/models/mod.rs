//! Data models shared between the cache, the API client and the UI.
//!
//! - `Coordinate`, `Region`: positions and map viewports
//! - `LocationStatus`: session-lifetime state of location acquisition
//! - `UserLocationsCache`, `SavedLocation`, `NewLocation`: location listing payloads
//! - `UserInfo`, `Registration`: the persisted session bundle and the sign-up body

pub mod location;
pub mod user;

pub use location::{
    Coordinate, LocationStatus, NewLocation, Region, SavedLocation, UserLocationsCache,
    DEFAULT_LOCATION, REGION_DELTA,
};
pub use user::{ChildDetail, ChildrenInfo, Registration, UserInfo};
