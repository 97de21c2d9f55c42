pub mod http;
pub mod writer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{LocationSample, PresenceStatus, VendorRecord};

pub use http::HttpBackend;
pub use writer::{LocationPersistenceClient, PersistOutcome};

/// Payload of the location PUT. The backend keeps exactly one of these per
/// vendor and overwrites it on every successful call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationWrite {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}

impl From<&LocationSample> for LocationWrite {
    fn from(sample: &LocationSample) -> Self {
        Self {
            latitude: sample.latitude,
            longitude: sample.longitude,
            accuracy: sample.accuracy_m,
        }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode backend response: {0}")]
    Decode(String),
}

/// The platform backend, treated as a black box. Endpoint shapes live
/// behind this trait; everything in the crate talks to it and nothing else.
#[async_trait]
pub trait VendorBackend: Send + Sync {
    async fn put_location(
        &self,
        vendor_id: &str,
        location: &LocationWrite,
    ) -> Result<(), BackendError>;

    async fn put_status(
        &self,
        vendor_id: &str,
        status: PresenceStatus,
    ) -> Result<(), BackendError>;

    async fn fetch_vendors(&self) -> Result<Vec<VendorRecord>, BackendError>;
}
