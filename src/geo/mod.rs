pub mod simulated;
pub mod source;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::LocationSample;

pub use simulated::SimulatedSensor;
pub use source::{GeolocationSource, PositionWatch};

/// Errors from the device position sensor.
///
/// PermissionDenied is terminal for the current watch attempt; Timeout and
/// PositionUnavailable are transient and leave the subscription alive for
/// later callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeoError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position request timed out")]
    Timeout,
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
    #[error("a position watch is already active")]
    AlreadyWatching,
}

impl GeoError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, GeoError::PermissionDenied | GeoError::AlreadyWatching)
    }
}

/// Position read policy. The defaults trade precision for responsiveness
/// and battery: network-based fixes over full GPS, a 15s timeout, and
/// cached fixes accepted up to five minutes old.
#[derive(Debug, Clone)]
pub struct GeoOptions {
    pub prefer_low_power: bool,
    pub timeout: Duration,
    pub max_fix_age: Duration,
}

impl Default for GeoOptions {
    fn default() -> Self {
        Self {
            prefer_low_power: true,
            timeout: Duration::from_secs(15),
            max_fix_age: Duration::from_secs(300),
        }
    }
}

pub type SensorEvent = Result<LocationSample, GeoError>;

/// Platform seam for the device geolocation API. Implementations bridge to
/// whatever the host platform provides; the crate ships `SimulatedSensor`
/// for tests and demos.
#[async_trait]
pub trait PositionSensor: Send + Sync {
    /// Single fix, subject to the timeout and cached-fix policy in `options`.
    async fn read_once(&self, options: &GeoOptions) -> Result<LocationSample, GeoError>;

    /// Open a continuous fix stream. Delivery stops when the receiver is
    /// dropped.
    async fn subscribe(
        &self,
        options: &GeoOptions,
    ) -> Result<mpsc::Receiver<SensorEvent>, GeoError>;
}
