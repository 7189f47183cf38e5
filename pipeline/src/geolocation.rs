//! Device position source.
//!
//! A one-shot query: the capture flow asks once per button press and never
//! polls or tracks.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{ErrorContext, PipelineError, PipelineResult};
use crate::models::GeoPoint;

/// User-facing message for a denied position request.
pub const LOCATION_DENIED_MESSAGE: &str = "location unavailable, request denied";

#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// Current device position.
    ///
    /// # Returns
    /// * `Ok(GeoPoint)` - A validated coordinate
    /// * `Err(PipelineError::PermissionError)` - The user or platform refused
    async fn current_position(&self) -> PipelineResult<GeoPoint>;
}

/// Always reports the same position, optionally after a delay.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocator {
    position: GeoPoint,
    delay: Duration,
}

impl FixedLocator {
    pub fn new(position: GeoPoint) -> Self {
        Self {
            position,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl GeoLocator for FixedLocator {
    async fn current_position(&self) -> PipelineResult<GeoPoint> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.position)
    }
}

/// Always refuses, as a browser does after the user blocks location access.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeniedLocator;

#[async_trait]
impl GeoLocator for DeniedLocator {
    async fn current_position(&self) -> PipelineResult<GeoPoint> {
        Err(PipelineError::PermissionError {
            message: LOCATION_DENIED_MESSAGE.to_string(),
            context: ErrorContext::new("current_position"),
        })
    }
}
