//! Live-location and presence core for the Vendly vendor-discovery
//! platform: continuous position capture, throttled persistence, the
//! presence side effects of the tracking lifecycle, deferred deactivation
//! after logout, and the read-side map feed. The surrounding app (auth,
//! profiles, menus, UI) lives elsewhere and talks to this crate through
//! `PresenceController` and friends.

pub mod backend;
pub mod deactivation;
pub mod geo;
pub mod map_feed;
pub mod models;
pub mod settings;
pub mod tracking;
mod utils;

pub use backend::{
    BackendError, HttpBackend, LocationPersistenceClient, LocationWrite, PersistOutcome,
    VendorBackend,
};
pub use deactivation::DeferredDeactivationScheduler;
pub use geo::{
    GeoError, GeoOptions, GeolocationSource, PositionSensor, PositionWatch, SensorEvent,
    SimulatedSensor,
};
pub use map_feed::{build_view, MapConsumer, MapView, VendorMarker};
pub use models::{
    GeoPoint, LocationSample, PersistedLocation, PresenceStatus, VendorLocation, VendorRecord,
};
pub use settings::{SettingsStore, TrackingSettings};
pub use tracking::{
    PresenceController, SampleThrottler, TrackingEvent, TrackingSnapshot, TrackingState,
    TrackingStatus,
};
