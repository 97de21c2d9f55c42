pub mod controller;
mod loop_worker;
pub mod state;
pub mod throttle;

pub use controller::{PresenceController, TrackingEvent, TrackingSession};
pub use state::{TrackingSnapshot, TrackingState, TrackingStatus};
pub use throttle::SampleThrottler;
