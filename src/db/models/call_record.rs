//! Finalized call measurements.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub id: String,
    pub label: String,
    pub phone_number: String,
    pub speaking_time_ms: u64,
    pub listening_time_ms: u64,
    pub total_duration_ms: u64,
    pub started_at: DateTime<Utc>,
    /// `YYYY-MM-DD` in local time.
    pub call_date: String,
    /// `YYYY-MM` in local time.
    pub call_month: String,
    /// `YYYY` in local time.
    pub call_year: String,
    pub talk_ratio: f64,
}

impl CallRecord {
    pub fn new(
        label: impl Into<String>,
        phone_number: impl Into<String>,
        speaking_time_ms: u64,
        listening_time_ms: u64,
        total_duration_ms: u64,
        started_at: DateTime<Utc>,
    ) -> Self {
        let keys = PeriodKeys::for_instant(&started_at);
        Self {
            id: Uuid::new_v4().to_string(),
            label: label.into(),
            phone_number: phone_number.into(),
            speaking_time_ms,
            listening_time_ms,
            total_duration_ms,
            started_at,
            call_date: keys.date,
            call_month: keys.month,
            call_year: keys.year,
            talk_ratio: talk_ratio(speaking_time_ms, listening_time_ms),
        }
    }

    pub fn listen_ratio(&self) -> f64 {
        100.0 - self.talk_ratio
    }
}

/// Percentage of classified time spent speaking; 0 when nothing was classified.
pub fn talk_ratio(speaking_ms: u64, listening_ms: u64) -> f64 {
    let total = speaking_ms.saturating_add(listening_ms);
    if total == 0 {
        return 0.0;
    }
    (speaking_ms as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// String keys used to bucket records by day, month and year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodKeys {
    pub date: String,
    pub month: String,
    pub year: String,
}

impl PeriodKeys {
    pub fn for_instant(instant: &DateTime<Utc>) -> Self {
        let local = instant.with_timezone(&Local);
        Self {
            date: local.format("%Y-%m-%d").to_string(),
            month: local.format("%Y-%m").to_string(),
            year: local.format("%Y").to_string(),
        }
    }
}

/// Per-contact call volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContactCallCount {
    pub label: String,
    pub call_count: u64,
}
