use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Speaking/listening totals for the call in progress. The sampling task is
/// the only writer; status readers may load at any time.
#[derive(Debug, Default)]
pub struct Accumulators {
    speaking_ms: AtomicU64,
    listening_ms: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulatorSnapshot {
    pub speaking_ms: u64,
    pub listening_ms: u64,
}

impl AccumulatorSnapshot {
    pub fn tracked_ms(&self) -> u64 {
        self.speaking_ms.saturating_add(self.listening_ms)
    }
}

impl Accumulators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn speaking_ms(&self) -> u64 {
        self.speaking_ms.load(Ordering::Acquire)
    }

    pub fn listening_ms(&self) -> u64 {
        self.listening_ms.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> AccumulatorSnapshot {
        AccumulatorSnapshot {
            speaking_ms: self.speaking_ms(),
            listening_ms: self.listening_ms(),
        }
    }

    pub fn reset(&self) {
        self.speaking_ms.store(0, Ordering::Release);
        self.listening_ms.store(0, Ordering::Release);
    }

    pub(crate) fn credit_speaking(&self, ms: u64) {
        self.speaking_ms.fetch_add(ms, Ordering::AcqRel);
    }

    pub(crate) fn credit_listening(&self, ms: u64) {
        self.listening_ms.fetch_add(ms, Ordering::AcqRel);
    }
}
