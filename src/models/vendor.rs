use serde::{Deserialize, Serialize};

use super::location::PersistedLocation;

/// Vendor-visible availability flag. Owned by the vendor record on the
/// backend; this subsystem writes it only on tracking start (Open), on
/// deferred deactivation (Closed), and optionally on stop when the
/// close-on-stop policy is enabled. Manual profile edits also set it out of
/// band, so the subsystem never caches and re-writes the current value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Open,
    Closed,
    Relocating,
    SoldOut,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Open => "open",
            PresenceStatus::Closed => "closed",
            PresenceStatus::Relocating => "relocating",
            PresenceStatus::SoldOut => "sold_out",
        }
    }
}

/// One vendor entry from the listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub status: PresenceStatus,
    #[serde(default)]
    pub location: Option<VendorLocation>,
}

/// Listing location payload. Coordinates come GeoJSON-style: [longitude,
/// latitude]. Entries with a missing or malformed pair are treated as
/// having no location at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorLocation {
    #[serde(default)]
    pub coordinates: Vec<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl VendorLocation {
    /// Returns (latitude, longitude) when the coordinate pair is present
    /// and finite.
    pub fn lat_lng(&self) -> Option<(f64, f64)> {
        match self.coordinates.as_slice() {
            [lng, lat, ..] if lng.is_finite() && lat.is_finite() => Some((*lat, *lng)),
            _ => None,
        }
    }
}

impl VendorRecord {
    /// The vendor's persisted location, if the listing carried a usable one.
    pub fn persisted_location(&self) -> Option<PersistedLocation> {
        let location = self.location.as_ref()?;
        let (latitude, longitude) = location.lat_lng()?;
        Some(PersistedLocation {
            vendor_id: self.id.clone(),
            latitude,
            longitude,
            accuracy_m: location.accuracy,
            updated_at: location.updated_at,
        })
    }
}
