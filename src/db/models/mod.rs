pub mod calibration_profile;
pub mod call_record;
pub mod tracked_number;

pub use calibration_profile::CalibrationProfile;
pub use call_record::{talk_ratio, CallRecord, ContactCallCount, PeriodKeys};
pub use tracked_number::TrackedNumber;
