use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::backend::VendorBackend;
use crate::models::PresenceStatus;

/// Closes a vendor's visibility a fixed grace period after logout.
///
/// The registry is keyed by vendor id and intentionally outlives any single
/// login/logout cycle: re-login cancels the pending timer by key, repeated
/// logout replaces it, and concurrent vendor sessions never clobber each
/// other's slot. A timer fires at most once; cancellation is idempotent,
/// including after the fire.
#[derive(Clone)]
pub struct DeferredDeactivationScheduler {
    backend: Arc<dyn VendorBackend>,
    delay: Duration,
    pending: Arc<Mutex<HashMap<String, PendingDeactivation>>>,
}

struct PendingDeactivation {
    timer_id: Uuid,
    fire_at: DateTime<Utc>,
    cancel_token: CancellationToken,
    _worker: JoinHandle<()>,
}

impl DeferredDeactivationScheduler {
    pub fn new(backend: Arc<dyn VendorBackend>, delay: Duration) -> Self {
        Self {
            backend,
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Arm the one-shot close timer for this vendor. A timer already
    /// pending for the same vendor is replaced, re-anchoring the grace
    /// period to this logout.
    pub fn on_logout(&self, vendor_id: &str) -> DateTime<Utc> {
        let timer_id = Uuid::new_v4();
        let fire_at = Utc::now()
            + chrono::Duration::from_std(self.delay).unwrap_or_else(|_| chrono::Duration::zero());
        let cancel_token = CancellationToken::new();

        let token = cancel_token.clone();
        let backend = self.backend.clone();
        let registry = self.pending.clone();
        let vendor = vendor_id.to_string();

        // Created here, not inside the task, so the grace period is
        // anchored to the logout instant.
        let grace = tokio::time::sleep(self.delay);

        let worker = tokio::spawn(async move {
            tokio::select! {
                _ = grace => {
                    info!("deactivation grace period elapsed for vendor {}; closing", vendor);
                    if let Err(err) = backend.put_status(&vendor, PresenceStatus::Closed).await {
                        // Not retried; the vendor simply stays visible until
                        // the next explicit status change.
                        warn!("deferred close failed for vendor {}: {}", vendor, err);
                    }
                    let mut pending = registry.lock().unwrap();
                    // A replacement timer may hold the slot by now; only
                    // remove our own entry.
                    if pending
                        .get(&vendor)
                        .is_some_and(|entry| entry.timer_id == timer_id)
                    {
                        pending.remove(&vendor);
                    }
                }
                _ = token.cancelled() => {}
            }
        });

        let previous = self.pending.lock().unwrap().insert(
            vendor_id.to_string(),
            PendingDeactivation {
                timer_id,
                fire_at,
                cancel_token,
                _worker: worker,
            },
        );
        if let Some(previous) = previous {
            previous.cancel_token.cancel();
            info!("deactivation timer re-anchored for vendor {}", vendor_id);
        }

        fire_at
    }

    /// Disarm the pending timer, typically on re-login. Idempotent: calling
    /// with no pending timer, after a cancel, or after the fire is a no-op.
    pub fn cancel(&self, vendor_id: &str) {
        let removed = self.pending.lock().unwrap().remove(vendor_id);
        if let Some(entry) = removed {
            entry.cancel_token.cancel();
            info!("deactivation canceled for vendor {}", vendor_id);
        }
    }

    pub fn is_pending(&self, vendor_id: &str) -> bool {
        self.pending.lock().unwrap().contains_key(vendor_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// When the pending timer for this vendor will fire, if one is armed.
    pub fn fire_at(&self, vendor_id: &str) -> Option<DateTime<Utc>> {
        self.pending
            .lock()
            .unwrap()
            .get(vendor_id)
            .map(|entry| entry.fire_at)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;
    use crate::backend::{BackendError, LocationWrite};
    use crate::models::VendorRecord;

    #[derive(Default)]
    struct StatusBackend {
        statuses: StdMutex<Vec<(String, PresenceStatus)>>,
    }

    impl StatusBackend {
        fn closed_writes(&self, vendor_id: &str) -> usize {
            self.statuses
                .lock()
                .unwrap()
                .iter()
                .filter(|(id, status)| id == vendor_id && *status == PresenceStatus::Closed)
                .count()
        }
    }

    #[async_trait]
    impl VendorBackend for StatusBackend {
        async fn put_location(
            &self,
            _vendor_id: &str,
            _location: &LocationWrite,
        ) -> Result<(), BackendError> {
            Ok(())
        }

        async fn put_status(
            &self,
            vendor_id: &str,
            status: PresenceStatus,
        ) -> Result<(), BackendError> {
            self.statuses
                .lock()
                .unwrap()
                .push((vendor_id.to_string(), status));
            Ok(())
        }

        async fn fetch_vendors(&self) -> Result<Vec<VendorRecord>, BackendError> {
            Ok(Vec::new())
        }
    }

    const GRACE: Duration = Duration::from_secs(120);

    /// Sleeping on the paused clock auto-advances through every pending
    /// deadline, draining the woken tasks at each step.
    async fn run_for(duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    #[tokio::test(start_paused = true)]
    async fn fires_closed_exactly_once_at_the_grace_period() {
        let backend = Arc::new(StatusBackend::default());
        let scheduler = DeferredDeactivationScheduler::new(backend.clone(), GRACE);

        scheduler.on_logout("v-1");
        assert!(scheduler.is_pending("v-1"));

        run_for(Duration::from_secs(119)).await;
        assert_eq!(backend.closed_writes("v-1"), 0);

        run_for(Duration::from_secs(2)).await;
        assert_eq!(backend.closed_writes("v-1"), 1);
        assert!(!scheduler.is_pending("v-1"));

        run_for(Duration::from_secs(600)).await;
        assert_eq!(backend.closed_writes("v-1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_the_fire_prevents_it_forever() {
        let backend = Arc::new(StatusBackend::default());
        let scheduler = DeferredDeactivationScheduler::new(backend.clone(), GRACE);

        scheduler.on_logout("v-1");
        run_for(Duration::from_secs(60)).await;
        scheduler.cancel("v-1");
        assert!(!scheduler.is_pending("v-1"));

        run_for(Duration::from_secs(600)).await;
        assert_eq!(backend.closed_writes("v-1"), 0);

        // Idempotent after cancel.
        scheduler.cancel("v-1");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_the_fire_is_a_no_op() {
        let backend = Arc::new(StatusBackend::default());
        let scheduler = DeferredDeactivationScheduler::new(backend.clone(), GRACE);

        scheduler.on_logout("v-1");
        run_for(Duration::from_secs(121)).await;
        assert_eq!(backend.closed_writes("v-1"), 1);

        scheduler.cancel("v-1");
        assert_eq!(backend.closed_writes("v-1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_logout_re_anchors_the_timer() {
        let backend = Arc::new(StatusBackend::default());
        let scheduler = DeferredDeactivationScheduler::new(backend.clone(), GRACE);

        scheduler.on_logout("v-1");
        run_for(Duration::from_secs(60)).await;
        scheduler.on_logout("v-1");
        assert_eq!(scheduler.pending_count(), 1);

        // The first timer would have fired at t=120.
        run_for(Duration::from_secs(61)).await;
        assert_eq!(backend.closed_writes("v-1"), 0);

        // The replacement fires at t=180.
        run_for(Duration::from_secs(60)).await;
        assert_eq!(backend.closed_writes("v-1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn vendors_have_independent_timers() {
        let backend = Arc::new(StatusBackend::default());
        let scheduler = DeferredDeactivationScheduler::new(backend.clone(), GRACE);

        scheduler.on_logout("v-1");
        scheduler.on_logout("v-2");
        assert_eq!(scheduler.pending_count(), 2);

        scheduler.cancel("v-1");
        run_for(Duration::from_secs(121)).await;

        assert_eq!(backend.closed_writes("v-1"), 0);
        assert_eq!(backend.closed_writes("v-2"), 1);
    }
}
