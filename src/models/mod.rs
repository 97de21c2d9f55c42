pub mod location;
pub mod vendor;

pub use location::{GeoPoint, LocationSample, PersistedLocation};
pub use vendor::{PresenceStatus, VendorLocation, VendorRecord};
