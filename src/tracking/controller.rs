use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use tokio::{sync::broadcast, sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::loop_worker::{tracking_loop, TrackingPipeline};
use super::state::{TrackingSnapshot, TrackingState};
use super::throttle::SampleThrottler;
use crate::backend::{LocationPersistenceClient, VendorBackend};
use crate::geo::{GeoError, GeolocationSource};
use crate::models::{LocationSample, PresenceStatus};
use crate::settings::TrackingSettings;

/// Events pushed to the surrounding UI. StateChanged drives the LIVE
/// indicator; the warning variants surface as dismissible notices and never
/// block anything.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TrackingEvent {
    StateChanged {
        snapshot: TrackingSnapshot,
    },
    SensorError {
        message: String,
        fatal: bool,
    },
    PersistenceWarning {
        message: String,
    },
    StatusWriteFailed {
        status: PresenceStatus,
        message: String,
    },
}

/// Process-local record of one live tracking engagement. Owns the worker
/// driving the watch; the write watermark lives in the session's
/// `LocationPersistenceClient`. Destroyed on stop.
pub struct TrackingSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    writer: LocationPersistenceClient,
    cancel_token: CancellationToken,
    worker: JoinHandle<()>,
}

/// Orchestrates the live-location pipeline for one vendor: owns the
/// geolocation watch, feeds samples through the throttler into the
/// persistence writer, and drives the presence side effects of the
/// tracking lifecycle.
///
/// All mutable scheduling state is scoped to this instance, so multiple
/// vendor sessions coexist in one process (and under test).
#[derive(Clone)]
pub struct PresenceController {
    vendor_id: String,
    backend: Arc<dyn VendorBackend>,
    source: GeolocationSource,
    settings: TrackingSettings,
    state: Arc<Mutex<TrackingState>>,
    session: Arc<Mutex<Option<TrackingSession>>>,
    events: broadcast::Sender<TrackingEvent>,
}

impl PresenceController {
    pub fn new(
        vendor_id: impl Into<String>,
        backend: Arc<dyn VendorBackend>,
        source: GeolocationSource,
        settings: TrackingSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            vendor_id: vendor_id.into(),
            backend,
            source,
            settings,
            state: Arc::new(Mutex::new(TrackingState::new())),
            session: Arc::new(Mutex::new(None)),
            events,
        }
    }

    pub fn vendor_id(&self) -> &str {
        &self.vendor_id
    }

    pub async fn snapshot(&self) -> TrackingSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn is_tracking(&self) -> bool {
        self.state.lock().await.is_tracking()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackingEvent> {
        self.events.subscribe()
    }

    /// Timestamp of the newest successfully persisted sample in the current
    /// session, if any. Gone once the session is destroyed.
    pub async fn last_persisted_at(&self) -> Option<DateTime<Utc>> {
        let session = self.session.lock().await;
        session
            .as_ref()
            .and_then(|session| session.writer.last_persisted_at())
    }

    /// Go live: mark the vendor open and start piping positions to the
    /// backend. Errors on double-start and when the sensor refuses the
    /// watch.
    pub async fn start_tracking(&self) -> Result<TrackingSnapshot> {
        let mut session_guard = self.session.lock().await;
        if let Some(existing) = session_guard.as_ref() {
            if !existing.worker.is_finished() {
                bail!("tracking already active");
            }
            // The previous watch ended on its own (permission loss or
            // sensor stream end); reap it and start fresh.
            *session_guard = None;
        }

        // Presence flips to Open as a side effect of going live. Failure
        // here is a warning, never a reason to hold up tracking.
        self.spawn_status_write(PresenceStatus::Open);

        let watch = self
            .source
            .watch()
            .await
            .context("failed to start position watch")?;

        let session_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();

        {
            let mut state = self.state.lock().await;
            state.begin_session(session_id.clone(), started_at);
        }

        let cancel_token = CancellationToken::new();
        let writer =
            LocationPersistenceClient::new(self.backend.clone(), self.vendor_id.clone());
        let pipeline = TrackingPipeline {
            session_id: session_id.clone(),
            writer: writer.clone(),
            throttler: SampleThrottler::new(self.settings.throttle_floor()),
            state: self.state.clone(),
            events: self.events.clone(),
        };
        let worker = tokio::spawn(tracking_loop(watch, pipeline, cancel_token.clone()));

        *session_guard = Some(TrackingSession {
            id: session_id.clone(),
            started_at,
            writer,
            cancel_token,
            worker,
        });
        drop(session_guard);

        info!(
            "tracking started for vendor {} (session {})",
            self.vendor_id, session_id
        );

        self.emit_state_changed().await;
        Ok(self.snapshot().await)
    }

    /// Stop the watch and destroy the session. Idempotent. Presence status
    /// is left untouched unless the close-on-stop policy is enabled: going
    /// offline and closing up are separate actions by default.
    pub async fn stop_tracking(&self) -> Result<()> {
        let session = { self.session.lock().await.take() };
        let Some(session) = session else {
            return Ok(());
        };

        session.cancel_token.cancel();
        session
            .worker
            .await
            .context("tracking loop task failed to join")?;

        info!(
            "tracking stopped for vendor {} (session {})",
            self.vendor_id, session.id
        );

        if self.settings.close_on_stop {
            self.spawn_status_write(PresenceStatus::Closed);
        }

        Ok(())
    }

    /// One-shot position read outside the watch lifecycle.
    pub async fn current_location_once(&self) -> Result<LocationSample, GeoError> {
        let sample = self.source.read_once().await?;
        {
            self.state.lock().await.record_sample(sample.clone());
        }
        Ok(sample)
    }

    fn spawn_status_write(&self, status: PresenceStatus) {
        let backend = self.backend.clone();
        let vendor_id = self.vendor_id.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            match backend.put_status(&vendor_id, status).await {
                Ok(()) => {
                    info!("vendor {} status set to {}", vendor_id, status.as_str());
                }
                Err(err) => {
                    warn!(
                        "status write {} failed for vendor {}: {}",
                        status.as_str(),
                        vendor_id,
                        err
                    );
                    let _ = events.send(TrackingEvent::StatusWriteFailed {
                        status,
                        message: err.to_string(),
                    });
                }
            }
        });
    }

    async fn emit_state_changed(&self) {
        let snapshot = self.state.lock().await.snapshot();
        let _ = self.events.send(TrackingEvent::StateChanged { snapshot });
    }
}
