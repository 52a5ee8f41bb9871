use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Noise floor used when no calibration has produced one.
pub const DEFAULT_NOISE_FLOOR: f64 = 100.0;
/// Speaking threshold used when no calibration has produced one.
pub const DEFAULT_SPEAKING_THRESHOLD: f64 = 1_000.0;
/// Average speaking level assumed when a run saw no qualifying speech.
pub const DEFAULT_AVERAGE_SPEAKING_LEVEL: f64 = 1_500.0;
/// Average speaking level recorded when calibration is skipped.
pub const SKIPPED_AVERAGE_SPEAKING_LEVEL: f64 = 2_000.0;

/// Persisted thresholds for the voice activity classifier. Levels are linear
/// RMS of 16-bit PCM, the same unit the live sampler produces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationProfile {
    pub noise_floor: f64,
    pub speaking_threshold: f64,
    pub average_speaking_level: f64,
    pub qualifying_samples: u32,
    pub skipped: bool,
    pub captured_at: DateTime<Utc>,
}

impl CalibrationProfile {
    pub fn fallback(captured_at: DateTime<Utc>) -> Self {
        Self {
            noise_floor: DEFAULT_NOISE_FLOOR,
            speaking_threshold: DEFAULT_SPEAKING_THRESHOLD,
            average_speaking_level: DEFAULT_AVERAGE_SPEAKING_LEVEL,
            qualifying_samples: 0,
            skipped: false,
            captured_at,
        }
    }

    pub fn skipped(captured_at: DateTime<Utc>) -> Self {
        Self {
            average_speaking_level: SKIPPED_AVERAGE_SPEAKING_LEVEL,
            skipped: true,
            ..Self::fallback(captured_at)
        }
    }
}
