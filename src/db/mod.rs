pub mod connection;
pub mod helpers;
mod migrations;
pub mod models;
pub mod repositories;

pub use connection::Database;
pub use helpers::persist_with_retry;
pub use models::{
    CalibrationProfile, CallRecord, ContactCallCount, PeriodKeys, TrackedNumber,
};
pub use repositories::call_records::{PeriodKey, RecordQuery};
