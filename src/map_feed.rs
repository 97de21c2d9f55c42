use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backend::VendorBackend;
use crate::models::{GeoPoint, PersistedLocation, PresenceStatus, VendorRecord};

/// One map marker. Only vendors with a usable coordinate pair become
/// markers; everyone else is skipped outright.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorMarker {
    pub vendor_id: String,
    pub name: String,
    pub status: PresenceStatus,
    pub location: PersistedLocation,
}

/// Rendered read-side view of the vendor listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub center: GeoPoint,
    pub markers: Vec<VendorMarker>,
}

/// Periodically re-fetches the vendor listing and publishes the rendered
/// view on a watch channel. Read-side only: fully decoupled from the
/// location write path. A failed refresh keeps the previous view.
pub struct MapConsumer {
    backend: Arc<dyn VendorBackend>,
    refresh_interval: Duration,
    fallback_center: GeoPoint,
    view_tx: watch::Sender<MapView>,
    worker: Mutex<Option<RefreshWorker>>,
}

struct RefreshWorker {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl MapConsumer {
    pub fn new(
        backend: Arc<dyn VendorBackend>,
        refresh_interval: Duration,
        fallback_center: GeoPoint,
    ) -> Self {
        let (view_tx, _) = watch::channel(MapView {
            center: fallback_center,
            markers: Vec::new(),
        });
        Self {
            backend,
            refresh_interval,
            fallback_center,
            view_tx,
            worker: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<MapView> {
        self.view_tx.subscribe()
    }

    /// Begin the refresh loop; the first fetch happens immediately.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            bail!("map refresh already active");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(refresh_loop(
            self.backend.clone(),
            self.refresh_interval,
            self.fallback_center,
            self.view_tx.clone(),
            cancel_token.clone(),
        ));

        *worker = Some(RefreshWorker {
            cancel_token,
            handle,
        });
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let taken = { self.worker.lock().unwrap().take() };
        if let Some(worker) = taken {
            worker.cancel_token.cancel();
            worker
                .handle
                .await
                .context("map refresh task failed to join")?;
        }
        Ok(())
    }
}

async fn refresh_loop(
    backend: Arc<dyn VendorBackend>,
    refresh_interval: Duration,
    fallback_center: GeoPoint,
    view_tx: watch::Sender<MapView>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match backend.fetch_vendors().await {
                    Ok(vendors) => {
                        let view = build_view(&vendors, fallback_center);
                        let _ = view_tx.send(view);
                    }
                    Err(err) => {
                        // Keep showing the previous view.
                        warn!("vendor listing refresh failed: {}", err);
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!("map refresh loop shutting down");
                break;
            }
        }
    }
}

/// Render the listing: one marker per vendor with valid coordinates.
/// Center is the first such vendor, else the fallback region centroid.
/// Vendors without coordinates never appear and are never defaulted.
pub fn build_view(vendors: &[VendorRecord], fallback_center: GeoPoint) -> MapView {
    let mut markers = Vec::new();
    for vendor in vendors {
        let Some(location) = vendor.persisted_location() else {
            continue;
        };
        markers.push(VendorMarker {
            vendor_id: vendor.id.clone(),
            name: vendor.name.clone(),
            status: vendor.status,
            location,
        });
    }

    let center = markers
        .first()
        .map(|marker| GeoPoint::new(marker.location.latitude, marker.location.longitude))
        .unwrap_or(fallback_center);

    MapView { center, markers }
}
