use std::time::Duration;

use tokio::time::Instant;

use crate::models::LocationSample;

/// Collapses the raw sensor stream into at most one forward per floor
/// window.
///
/// O(1) state: the instant of the last forward plus the latest buffered
/// sample. A sample arriving inside the window replaces any earlier
/// buffered one, so the forward that ends a window always carries the most
/// recent sample, and the buffer never grows.
#[derive(Debug)]
pub struct SampleThrottler {
    floor: Duration,
    last_forwarded_at: Option<Instant>,
    pending: Option<LocationSample>,
}

impl SampleThrottler {
    pub fn new(floor: Duration) -> Self {
        Self {
            floor,
            last_forwarded_at: None,
            pending: None,
        }
    }

    /// Decide for a fresh sample: forward it now, or buffer it as the
    /// pending latest.
    pub fn offer(&mut self, sample: LocationSample, now: Instant) -> Option<LocationSample> {
        if self.floor_elapsed(now) {
            self.last_forwarded_at = Some(now);
            self.pending = None;
            Some(sample)
        } else {
            self.pending = Some(sample);
            None
        }
    }

    /// Release the buffered sample once the floor has elapsed.
    pub fn take_due(&mut self, now: Instant) -> Option<LocationSample> {
        if self.pending.is_some() && self.floor_elapsed(now) {
            self.last_forwarded_at = Some(now);
            self.pending.take()
        } else {
            None
        }
    }

    /// When a sample is buffered, the instant it becomes due. Drives the
    /// tracking loop's flush timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref()?;
        self.last_forwarded_at.map(|last| last + self.floor)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn floor_elapsed(&self, now: Instant) -> bool {
        self.last_forwarded_at
            .map(|last| now.duration_since(last) >= self.floor)
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    const FLOOR: Duration = Duration::from_secs(10);

    fn sample(lat: f64) -> LocationSample {
        LocationSample::new(lat, 106.8, 10.0, Utc::now())
    }

    #[tokio::test(start_paused = true)]
    async fn first_sample_is_forwarded_immediately() {
        let mut throttler = SampleThrottler::new(FLOOR);
        let forwarded = throttler.offer(sample(1.0), Instant::now());
        assert!(forwarded.is_some());
        assert!(!throttler.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn samples_inside_the_window_replace_the_pending_latest() {
        let mut throttler = SampleThrottler::new(FLOOR);
        assert!(throttler.offer(sample(1.0), Instant::now()).is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(throttler.offer(sample(2.0), Instant::now()).is_none());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(throttler.offer(sample(3.0), Instant::now()).is_none());

        // Not due yet at 8s.
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(throttler.take_due(Instant::now()).is_none());

        // Due at 10s, and it is the latest buffered sample, not the first.
        tokio::time::advance(Duration::from_secs(2)).await;
        let released = throttler.take_due(Instant::now()).unwrap();
        assert_eq!(released.latitude, 3.0);
        assert!(!throttler.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_forwards_first_then_latest_pending() {
        // Samples at t=1s, 3s, 9s, 11s with a 10s floor: forwards happen at
        // ~1s (first sample) and ~11s carrying the 9s sample, which was the
        // pending latest when the floor elapsed.
        let mut throttler = SampleThrottler::new(FLOOR);
        let mut forwarded = Vec::new();

        tokio::time::advance(Duration::from_secs(1)).await;
        if let Some(s) = throttler.offer(sample(1.0), Instant::now()) {
            forwarded.push((1, s));
        }

        tokio::time::advance(Duration::from_secs(2)).await;
        if let Some(s) = throttler.offer(sample(3.0), Instant::now()) {
            forwarded.push((3, s));
        }

        tokio::time::advance(Duration::from_secs(6)).await;
        if let Some(s) = throttler.offer(sample(9.0), Instant::now()) {
            forwarded.push((9, s));
        }

        // Floor elapses at t=11s; the flush beats the 11s sample.
        tokio::time::advance(Duration::from_secs(2)).await;
        if let Some(s) = throttler.take_due(Instant::now()) {
            forwarded.push((11, s));
        }
        if let Some(s) = throttler.offer(sample(11.0), Instant::now()) {
            forwarded.push((11, s));
        }

        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded[0].1.latitude, 1.0);
        assert_eq!(forwarded[1].0, 11);
        assert_eq!(forwarded[1].1.latitude, 9.0);
        // The 11s sample is buffered for the next window.
        assert!(throttler.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_tracks_the_window_end() {
        let mut throttler = SampleThrottler::new(FLOOR);
        assert!(throttler.next_deadline().is_none());

        let start = Instant::now();
        throttler.offer(sample(1.0), start);
        assert!(throttler.next_deadline().is_none());

        tokio::time::advance(Duration::from_secs(3)).await;
        throttler.offer(sample(2.0), Instant::now());
        assert_eq!(throttler.next_deadline(), Some(start + FLOOR));
    }
}
