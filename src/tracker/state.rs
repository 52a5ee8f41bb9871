use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::{db::TrackedNumber, sampling::LoopId};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TrackerStatus {
    #[default]
    Idle,
    Tracking,
    /// The call has ended and its totals are being read and stored.
    Finalizing,
}

#[derive(Debug, Clone, Default)]
pub struct TrackerState {
    pub status: TrackerStatus,
    pub label: Option<String>,
    pub phone_number: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// Wall-clock anchor for the call duration.
    pub anchor: Option<Instant>,
    /// Set while the classifier owns the sampling loop.
    pub loop_id: Option<LoopId>,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_call(
        &mut self,
        tracked: &TrackedNumber,
        started_at: DateTime<Utc>,
        now: Instant,
        loop_id: Option<LoopId>,
    ) {
        *self = Self {
            status: TrackerStatus::Tracking,
            label: Some(tracked.label.clone()),
            phone_number: Some(tracked.phone_number.clone()),
            started_at: Some(started_at),
            anchor: Some(now),
            loop_id,
        };
    }

    /// Returns the call duration and holds the tracker out of `Idle` until
    /// [`clear`](Self::clear).
    pub fn begin_finalize(&mut self) -> u64 {
        self.status = TrackerStatus::Finalizing;
        self.elapsed_ms()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.anchor
            .map(|anchor| anchor.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    pub status: TrackerStatus,
    pub label: Option<String>,
    pub phone_number: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_ms: u64,
    pub speaking_ms: u64,
    pub listening_ms: u64,
    pub audio_available: bool,
}
