use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::controller::TrackingEvent;
use super::state::TrackingState;
use super::throttle::SampleThrottler;
use crate::backend::{LocationPersistenceClient, PersistOutcome};
use crate::geo::PositionWatch;
use crate::models::LocationSample;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Everything the tracking loop needs, bundled per session. The throttler
/// and writer are session-scoped: a new session starts with a fresh floor
/// window and a fresh write watermark.
pub(super) struct TrackingPipeline {
    pub(super) session_id: String,
    pub(super) writer: LocationPersistenceClient,
    pub(super) throttler: SampleThrottler,
    pub(super) state: Arc<Mutex<TrackingState>>,
    pub(super) events: broadcast::Sender<TrackingEvent>,
}

/// Pipes sensor events through the throttler into the persistence writer.
///
/// Persist calls are spawned, never awaited here, so sample delivery is
/// unaffected by network latency. Sensor errors are non-fatal except
/// permission loss, which ends the watch. The loop owns the watch handle;
/// leaving the loop for any reason drops it and releases the subscription
/// slot.
pub(super) async fn tracking_loop(
    mut watch: PositionWatch,
    mut pipeline: TrackingPipeline,
    cancel_token: CancellationToken,
) {
    loop {
        let flush_at = pipeline.throttler.next_deadline();

        // Biased: shutdown first, then a due flush, then fresh samples. A
        // sample landing exactly when the floor elapses belongs to the next
        // window; the pending one is forwarded.
        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => {
                log_info!("tracking loop shutting down for session {}", pipeline.session_id);
                break;
            }
            _ = tokio::time::sleep_until(flush_at.unwrap_or_else(Instant::now)), if flush_at.is_some() => {
                if let Some(due) = pipeline.throttler.take_due(Instant::now()) {
                    dispatch_persist(&pipeline, due);
                }
            }
            event = watch.next_event() => match event {
                Some(Ok(sample)) => {
                    handle_sample(&mut pipeline, sample).await;
                }
                Some(Err(err)) => {
                    log_warn!(
                        "sensor error in session {}: {}",
                        pipeline.session_id,
                        err
                    );
                    let fatal = err.is_fatal();
                    {
                        pipeline.state.lock().await.record_error(err.to_string());
                    }
                    let _ = pipeline.events.send(TrackingEvent::SensorError {
                        message: err.to_string(),
                        fatal,
                    });
                    if fatal {
                        break;
                    }
                }
                None => {
                    log_info!("sensor stream ended for session {}", pipeline.session_id);
                    break;
                }
            },
        }
    }

    // The session may end on its own (permission loss, sensor stream end);
    // the snapshot has to reflect the real watch state either way.
    let snapshot = {
        let mut state = pipeline.state.lock().await;
        state.end_session();
        state.snapshot()
    };
    let _ = pipeline
        .events
        .send(TrackingEvent::StateChanged { snapshot });
}

async fn handle_sample(pipeline: &mut TrackingPipeline, sample: LocationSample) {
    {
        pipeline.state.lock().await.record_sample(sample.clone());
    }

    if let Some(due) = pipeline.throttler.offer(sample, Instant::now()) {
        dispatch_persist(pipeline, due);
    }
}

fn dispatch_persist(pipeline: &TrackingPipeline, sample: LocationSample) {
    let writer = pipeline.writer.clone();
    let state = pipeline.state.clone();
    let events = pipeline.events.clone();
    let session_id = pipeline.session_id.clone();

    tokio::spawn(async move {
        match writer.persist(sample).await {
            Ok(PersistOutcome::Sent) => {}
            Ok(PersistOutcome::Superseded) => {
                log_info!("stale sample skipped for session {}", session_id);
            }
            Err(err) => {
                // Non-blocking warning; the next throttled cycle re-attempts.
                log_warn!("location persist failed for session {}: {}", session_id, err);
                {
                    state
                        .lock()
                        .await
                        .record_error(format!("location persist failed: {err}"));
                }
                let _ = events.send(TrackingEvent::PersistenceWarning {
                    message: err.to_string(),
                });
            }
        }
    });
}
