use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc;

use super::{GeoError, GeoOptions, PositionSensor, SensorEvent};
use crate::models::LocationSample;

/// Wraps a platform sensor and enforces the single-subscription invariant:
/// at most one `PositionWatch` exists per source at any time.
#[derive(Clone)]
pub struct GeolocationSource {
    sensor: Arc<dyn PositionSensor>,
    options: GeoOptions,
    watching: Arc<AtomicBool>,
}

impl GeolocationSource {
    pub fn new(sensor: Arc<dyn PositionSensor>, options: GeoOptions) -> Self {
        Self {
            sensor,
            options,
            watching: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn read_once(&self) -> Result<LocationSample, GeoError> {
        self.sensor.read_once(&self.options).await
    }

    /// Claim the subscription slot and open the fix stream. Fails with
    /// `AlreadyWatching` while a previous watch is still alive.
    pub async fn watch(&self) -> Result<PositionWatch, GeoError> {
        if self
            .watching
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GeoError::AlreadyWatching);
        }

        match self.sensor.subscribe(&self.options).await {
            Ok(events) => Ok(PositionWatch {
                events,
                _slot: WatchSlot(self.watching.clone()),
            }),
            Err(err) => {
                self.watching.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watching.load(Ordering::SeqCst)
    }
}

/// Owned handle to the active subscription. Dropping it releases the slot
/// and closes the channel, which tells the sensor to stop delivering.
pub struct PositionWatch {
    events: mpsc::Receiver<SensorEvent>,
    _slot: WatchSlot,
}

impl PositionWatch {
    /// Next fix or sensor error; `None` once the sensor ends the stream.
    pub async fn next_event(&mut self) -> Option<SensorEvent> {
        self.events.recv().await
    }

    pub fn cancel(self) {}
}

struct WatchSlot(Arc<AtomicBool>);

impl Drop for WatchSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::geo::SimulatedSensor;
    use crate::models::LocationSample;

    fn sample(lat: f64) -> LocationSample {
        LocationSample::new(lat, 106.8, 12.0, Utc::now())
    }

    #[tokio::test]
    async fn second_watch_is_rejected_while_first_is_alive() {
        let sensor = Arc::new(SimulatedSensor::new());
        sensor.push(Duration::ZERO, Ok(sample(-6.2)));
        let source = GeolocationSource::new(sensor, GeoOptions::default());

        let first = source.watch().await.unwrap();
        assert!(source.is_watching());
        assert_eq!(source.watch().await.err(), Some(GeoError::AlreadyWatching));

        drop(first);
        assert!(!source.is_watching());
        let _second = source.watch().await.unwrap();
    }

    #[tokio::test]
    async fn failed_subscribe_releases_the_slot() {
        let sensor = Arc::new(SimulatedSensor::new());
        sensor.deny_permission(true);
        let source = GeolocationSource::new(sensor.clone(), GeoOptions::default());

        assert_eq!(source.watch().await.err(), Some(GeoError::PermissionDenied));
        assert!(!source.is_watching());

        sensor.deny_permission(false);
        sensor.push(Duration::ZERO, Ok(sample(-6.2)));
        let mut watch = source.watch().await.unwrap();
        let event = watch.next_event().await.unwrap();
        assert!(event.is_ok());
    }
}
