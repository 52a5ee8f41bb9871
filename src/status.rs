use serde::Serialize;
use tokio::sync::broadcast;

use crate::{
    calibration::CalibrationPhase,
    db::{CalibrationProfile, CallRecord},
    tracker::TrackerSnapshot,
};

const STATUS_CHANNEL_CAPACITY: usize = 64;

/// Everything a status surface needs to render live state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StatusEvent {
    TrackingStarted(TrackerSnapshot),
    Heartbeat(TrackerSnapshot),
    CallFinalized {
        record: CallRecord,
        persisted: bool,
    },
    CalibrationProgress {
        phase: CalibrationPhase,
        phase_ms: u64,
    },
    CalibrationFinished {
        profile: CalibrationProfile,
        complete: bool,
    },
    /// Something the user should be told about (a dropped record, a failed
    /// calibration save).
    Notice {
        message: String,
    },
}

pub type StatusSender = broadcast::Sender<StatusEvent>;

pub fn status_channel() -> StatusSender {
    broadcast::channel(STATUS_CHANNEL_CAPACITY).0
}

/// Sends without caring whether anyone is listening.
pub(crate) fn emit(sender: &StatusSender, event: StatusEvent) {
    let _ = sender.send(event);
}
