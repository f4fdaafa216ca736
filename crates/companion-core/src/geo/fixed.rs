use async_trait::async_trait;
use tracing::debug;

use super::{GeoError, GeolocationProvider, LocationPermissions, PermissionState, Position, PositionOptions};
use crate::models::Coordinate;

/// Provider that reports a configured position, or no fix at all.
///
/// Used by hosts without positioning hardware (desktop, simulators).
pub struct FixedPositionProvider {
    coords: Option<Coordinate>,
}

impl FixedPositionProvider {
    pub fn new(coords: Option<Coordinate>) -> Self {
        Self { coords }
    }
}

#[async_trait]
impl GeolocationProvider for FixedPositionProvider {
    async fn current_position(&self, options: PositionOptions) -> Result<Position, GeoError> {
        debug!(high_accuracy = options.enable_high_accuracy, "Fixed position requested");
        self.coords
            .map(|coords| Position { coords })
            .ok_or_else(|| GeoError::Unavailable("no simulated position configured".to_string()))
    }
}

/// Permission gate for platforms that grant location access without a runtime prompt.
pub struct NoPrompt;

#[async_trait]
impl LocationPermissions for NoPrompt {
    fn requires_prompt(&self) -> bool {
        false
    }

    async fn request_foreground(&self) -> Result<PermissionState, GeoError> {
        Ok(PermissionState::Granted)
    }
}
