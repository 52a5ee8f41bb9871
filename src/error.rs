use thiserror::Error;

/// The audio capture path cannot produce a level right now (device missing,
/// permission denied, stream closed).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("audio unavailable: {reason}")]
pub struct AudioUnavailable {
    pub reason: String,
}

impl AudioUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A store write that failed on its first attempt and on the retry.
#[derive(Debug, Error)]
#[error("{what} could not be persisted after {attempts} attempts: {source}")]
pub struct PersistenceFailure {
    pub what: &'static str,
    pub attempts: u32,
    #[source]
    pub source: anyhow::Error,
}

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("sampling loop busy: {0}")]
    SamplerBusy(String),

    #[error("calibration sampling task failed: {0}")]
    Sampling(String),
}
