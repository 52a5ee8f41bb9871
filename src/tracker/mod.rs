pub mod controller;
pub mod finalize;
pub mod state;

pub use controller::{CallTracker, FinalizedCall, TrackerConfig};
pub use finalize::{finalize_times, Adjustment, CompletenessPolicy, FinalTimes};
pub use state::{TrackerSnapshot, TrackerState, TrackerStatus};
