use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::LocationSample;

/// Whether this vendor session is currently live-tracking. Presence status
/// is the other, independent axis and lives on the backend vendor record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TrackingStatus {
    Idle,
    Live,
}

impl Default for TrackingStatus {
    fn default() -> Self {
        TrackingStatus::Idle
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingState {
    pub status: TrackingStatus,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_sample: Option<LocationSample>,
    pub last_error: Option<String>,
}

impl Default for TrackingState {
    fn default() -> Self {
        Self {
            status: TrackingStatus::Idle,
            session_id: None,
            started_at: None,
            last_sample: None,
            last_error: None,
        }
    }
}

impl TrackingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_session(&mut self, session_id: String, started_at: DateTime<Utc>) {
        self.status = TrackingStatus::Live;
        self.session_id = Some(session_id);
        self.started_at = Some(started_at);
        self.last_error = None;
    }

    /// Ends the live session but keeps the last sample and error around for
    /// the UI.
    pub fn end_session(&mut self) {
        self.status = TrackingStatus::Idle;
        self.session_id = None;
        self.started_at = None;
    }

    pub fn record_sample(&mut self, sample: LocationSample) {
        self.last_sample = Some(sample);
    }

    pub fn record_error(&mut self, message: String) {
        self.last_error = Some(message);
    }

    pub fn is_tracking(&self) -> bool {
        self.status == TrackingStatus::Live
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        TrackingSnapshot {
            is_tracking: self.is_tracking(),
            last_sample: self.last_sample.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Read-only view handed to the surrounding UI. The `is_tracking` flag
/// reflects the actual watch state, never persistence success.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSnapshot {
    pub is_tracking: bool,
    pub last_sample: Option<LocationSample>,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_lifecycle_updates_snapshot() {
        let mut state = TrackingState::new();
        assert!(!state.snapshot().is_tracking);

        state.begin_session("s-1".into(), Utc::now());
        assert!(state.snapshot().is_tracking);

        state.record_error("sensor timeout".into());
        state.end_session();
        let snapshot = state.snapshot();
        assert!(!snapshot.is_tracking);
        // Last error survives the session for the UI notice.
        assert_eq!(snapshot.last_error.as_deref(), Some("sensor timeout"));
    }

    #[test]
    fn begin_session_clears_a_stale_error() {
        let mut state = TrackingState::new();
        state.record_error("old".into());
        state.begin_session("s-2".into(), Utc::now());
        assert!(state.snapshot().last_error.is_none());
    }
}
