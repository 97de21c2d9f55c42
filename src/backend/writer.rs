use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::{BackendError, LocationWrite, VendorBackend};
use crate::models::LocationSample;

/// Session-scoped writer for the vendor's live location.
///
/// The transport gives no ordering guarantee for overlapping calls, so the
/// writer keeps a timestamp watermark on both ends: samples older than the
/// newest already issued are skipped, and a call that completes after a
/// newer one was acknowledged re-sends the newest known sample. The stored
/// location therefore always converges to the greatest `captured_at`
/// successfully sent, independent of completion order.
///
/// There is no retry on failure: the next throttled sample re-attempts
/// naturally.
#[derive(Clone)]
pub struct LocationPersistenceClient {
    backend: Arc<dyn VendorBackend>,
    vendor_id: String,
    ordering: Arc<Mutex<WriteOrdering>>,
}

#[derive(Default)]
struct WriteOrdering {
    /// Newest sample handed to the transport; doubles as the repair payload.
    newest_issued: Option<LocationSample>,
    /// Greatest captured_at the backend has acknowledged.
    newest_acked: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Sent,
    /// Skipped: a newer sample was already on the wire.
    Superseded,
}

impl LocationPersistenceClient {
    pub fn new(backend: Arc<dyn VendorBackend>, vendor_id: impl Into<String>) -> Self {
        Self {
            backend,
            vendor_id: vendor_id.into(),
            ordering: Arc::new(Mutex::new(WriteOrdering::default())),
        }
    }

    pub fn vendor_id(&self) -> &str {
        &self.vendor_id
    }

    /// Timestamp of the most recent successfully acknowledged write.
    pub fn last_persisted_at(&self) -> Option<DateTime<Utc>> {
        self.ordering.lock().unwrap().newest_acked
    }

    pub async fn persist(&self, sample: LocationSample) -> Result<PersistOutcome, BackendError> {
        {
            let mut ordering = self.ordering.lock().unwrap();
            if ordering
                .newest_issued
                .as_ref()
                .is_some_and(|newest| newest.captured_at > sample.captured_at)
            {
                return Ok(PersistOutcome::Superseded);
            }
            ordering.newest_issued = Some(sample.clone());
        }

        self.backend
            .put_location(&self.vendor_id, &LocationWrite::from(&sample))
            .await?;

        // Completion-order compensation: if an older payload landed after a
        // newer one was already acknowledged, the backend now holds stale
        // coordinates. Re-send the newest known sample until the watermark
        // is consistent again.
        let mut acked = sample.captured_at;
        loop {
            let repair = {
                let mut ordering = self.ordering.lock().unwrap();
                match ordering.newest_acked {
                    Some(newest) if newest > acked => ordering.newest_issued.clone(),
                    _ => {
                        ordering.newest_acked = Some(acked);
                        None
                    }
                }
            };

            let Some(newest) = repair else { break };
            self.backend
                .put_location(&self.vendor_id, &LocationWrite::from(&newest))
                .await?;
            acked = newest.captured_at;
        }

        Ok(PersistOutcome::Sent)
    }
}
