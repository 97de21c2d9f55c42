use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use super::{GeoError, GeoOptions, PositionSensor, SensorEvent};
use crate::models::LocationSample;

/// Deterministic stand-in for a device sensor: replays a scripted sequence
/// of fixes and errors with per-step delays. Each subscription replays the
/// whole script. Used by tests and host-app demos.
pub struct SimulatedSensor {
    inner: Arc<Inner>,
}

struct Inner {
    script: Mutex<Vec<ScriptedEvent>>,
    current: Mutex<Option<LocationSample>>,
    deny_permission: AtomicBool,
}

#[derive(Clone)]
struct ScriptedEvent {
    /// Delay relative to the previous event.
    after: Duration,
    event: SensorEvent,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                script: Mutex::new(Vec::new()),
                current: Mutex::new(None),
                deny_permission: AtomicBool::new(false),
            }),
        }
    }

    /// Append one event, delivered `after` the previous one.
    pub fn push(&self, after: Duration, event: SensorEvent) {
        self.inner
            .script
            .lock()
            .unwrap()
            .push(ScriptedEvent { after, event });
    }

    /// Seed the cached fix returned by `read_once`.
    pub fn set_current(&self, sample: LocationSample) {
        *self.inner.current.lock().unwrap() = Some(sample);
    }

    pub fn deny_permission(&self, deny: bool) {
        self.inner.deny_permission.store(deny, Ordering::SeqCst);
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionSensor for SimulatedSensor {
    async fn read_once(&self, options: &GeoOptions) -> Result<LocationSample, GeoError> {
        if self.inner.deny_permission.load(Ordering::SeqCst) {
            return Err(GeoError::PermissionDenied);
        }

        let cached = self.inner.current.lock().unwrap().clone();
        match cached {
            Some(sample) => {
                let age = Utc::now().signed_duration_since(sample.captured_at);
                if age.num_seconds() >= 0 && age.to_std().unwrap_or_default() > options.max_fix_age
                {
                    // Cached fix is too old and there is nothing fresher to
                    // wait for.
                    return Err(GeoError::Timeout);
                }
                Ok(sample)
            }
            None => Err(GeoError::PositionUnavailable("no fix available".into())),
        }
    }

    async fn subscribe(
        &self,
        _options: &GeoOptions,
    ) -> Result<mpsc::Receiver<SensorEvent>, GeoError> {
        if self.inner.deny_permission.load(Ordering::SeqCst) {
            return Err(GeoError::PermissionDenied);
        }

        let script = self.inner.script.lock().unwrap().clone();
        let (tx, rx) = mpsc::channel(16);
        let inner = self.inner.clone();

        tokio::spawn(async move {
            for step in script {
                tokio::time::sleep(step.after).await;
                if let Ok(sample) = &step.event {
                    *inner.current.lock().unwrap() = Some(sample.clone());
                }
                if tx.send(step.event).await.is_err() {
                    // Receiver dropped: the watch was canceled.
                    return;
                }
            }
            // Script exhausted; a real sensor would simply go quiet. Keep
            // the stream open until the watch is dropped.
            tx.closed().await;
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_at(lat: f64, captured_at: chrono::DateTime<Utc>) -> LocationSample {
        LocationSample::new(lat, 106.8, 10.0, captured_at)
    }

    #[tokio::test]
    async fn read_once_returns_the_cached_fix() {
        let sensor = SimulatedSensor::new();
        sensor.set_current(sample_at(-6.2, Utc::now()));
        let fix = sensor.read_once(&GeoOptions::default()).await.unwrap();
        assert_eq!(fix.latitude, -6.2);
    }

    #[tokio::test]
    async fn read_once_rejects_a_stale_cached_fix() {
        let sensor = SimulatedSensor::new();
        let old = Utc::now() - chrono::Duration::seconds(600);
        sensor.set_current(sample_at(-6.2, old));
        let err = sensor.read_once(&GeoOptions::default()).await.unwrap_err();
        assert_eq!(err, GeoError::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_replays_the_script_in_order() {
        let sensor = SimulatedSensor::new();
        sensor.push(Duration::from_secs(1), Ok(sample_at(-6.20, Utc::now())));
        sensor.push(Duration::from_secs(1), Err(GeoError::Timeout));
        sensor.push(Duration::from_secs(1), Ok(sample_at(-6.21, Utc::now())));

        let mut rx = sensor.subscribe(&GeoOptions::default()).await.unwrap();
        assert!(rx.recv().await.unwrap().is_ok());
        assert_eq!(rx.recv().await.unwrap(), Err(GeoError::Timeout));
        assert!(rx.recv().await.unwrap().is_ok());

        // The stream stays open (but quiet) after the script runs out.
        tokio::task::yield_now().await;
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::mpsc::error::TryRecvError::Empty)
        ));
    }
}
