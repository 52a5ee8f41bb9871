use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{db::CalibrationProfile, settings::CalibrationSettings};

/// Lowest speaking threshold a full calibration run may produce.
pub const MIN_SPEAKING_THRESHOLD: f64 = 500.0;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationOutcome {
    pub profile: CalibrationProfile,
    /// False when no speech sample cleared the noise margin and the fallback
    /// thresholds were used.
    pub complete: bool,
    pub silence_samples: usize,
    pub speech_samples: usize,
    pub qualifying_samples: usize,
    pub persisted: bool,
}

/// Derives thresholds from the two calibration phases.
///
/// The noise floor is the loudest silence reading. Speech readings count
/// only above `noise_floor * speech_margin`; the threshold sits
/// `sensitivity` of the way from the noise floor to their mean, never below
/// [`MIN_SPEAKING_THRESHOLD`].
pub fn compute_profile(
    silence_levels: &[f64],
    speech_levels: &[f64],
    settings: &CalibrationSettings,
    captured_at: DateTime<Utc>,
) -> CalibrationOutcome {
    let noise_floor = silence_levels
        .iter()
        .copied()
        .filter(|level| level.is_finite())
        .fold(0.0_f64, f64::max);

    let margin = noise_floor * settings.speech_margin;
    let qualifying: Vec<f64> = speech_levels
        .iter()
        .copied()
        .filter(|level| level.is_finite() && *level > margin)
        .collect();

    if qualifying.is_empty() {
        return CalibrationOutcome {
            profile: CalibrationProfile::fallback(captured_at),
            complete: false,
            silence_samples: silence_levels.len(),
            speech_samples: speech_levels.len(),
            qualifying_samples: 0,
            persisted: false,
        };
    }

    let average = qualifying.iter().sum::<f64>() / qualifying.len() as f64;
    let raw_threshold = noise_floor + (average - noise_floor) * settings.sensitivity;
    // average > noise_floor here, so the raw threshold already clears it.
    let speaking_threshold = raw_threshold.max(MIN_SPEAKING_THRESHOLD);

    CalibrationOutcome {
        profile: CalibrationProfile {
            noise_floor,
            speaking_threshold,
            average_speaking_level: average,
            qualifying_samples: u32::try_from(qualifying.len()).unwrap_or(u32::MAX),
            skipped: false,
            captured_at,
        },
        complete: true,
        silence_samples: silence_levels.len(),
        speech_samples: speech_levels.len(),
        qualifying_samples: qualifying.len(),
        persisted: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::calibration_profile::{
        DEFAULT_NOISE_FLOOR, DEFAULT_SPEAKING_THRESHOLD,
    };

    fn settings() -> CalibrationSettings {
        CalibrationSettings::default()
    }

    #[test]
    fn noise_floor_is_loudest_silence_sample() {
        let outcome = compute_profile(&[120.0, 300.0, 80.0], &[2_000.0], &settings(), Utc::now());
        assert_eq!(outcome.profile.noise_floor, 300.0);
    }

    #[test]
    fn threshold_interpolates_between_floor_and_average() {
        // floor 1000, margin 1500, qualifying {2000, 4000} -> avg 3000
        let outcome = compute_profile(
            &[1_000.0, 900.0],
            &[1_400.0, 2_000.0, 4_000.0],
            &settings(),
            Utc::now(),
        );
        assert!(outcome.complete);
        assert_eq!(outcome.qualifying_samples, 2);
        assert_eq!(outcome.profile.average_speaking_level, 3_000.0);
        assert!((outcome.profile.speaking_threshold - 1_600.0).abs() < 1e-9);
    }

    #[test]
    fn low_thresholds_are_raised_to_minimum() {
        let outcome = compute_profile(&[20.0], &[200.0, 220.0], &settings(), Utc::now());
        assert!(outcome.complete);
        assert_eq!(outcome.profile.speaking_threshold, MIN_SPEAKING_THRESHOLD);
    }

    #[test]
    fn no_qualifying_speech_falls_back_to_defaults() {
        let outcome = compute_profile(&[800.0], &[900.0, 1_100.0], &settings(), Utc::now());
        assert!(!outcome.complete);
        assert_eq!(outcome.qualifying_samples, 0);
        assert_eq!(outcome.profile.noise_floor, DEFAULT_NOISE_FLOOR);
        assert_eq!(outcome.profile.speaking_threshold, DEFAULT_SPEAKING_THRESHOLD);
        assert!(!outcome.profile.skipped);

        let empty = compute_profile(&[], &[], &settings(), Utc::now());
        assert!(!empty.complete);
    }

    #[test]
    fn threshold_exceeds_floor_whenever_speech_qualifies() {
        let floors = [0.0, 10.0, 250.0, 499.0, 700.0, 5_000.0];
        let sensitivities = [0.01, 0.3, 1.0];
        for floor in floors {
            for sensitivity in sensitivities {
                let settings = CalibrationSettings {
                    sensitivity,
                    ..CalibrationSettings::default()
                };
                let speech = [floor * 1.5 + 1.0, floor * 3.0 + 50.0];
                let outcome = compute_profile(&[floor], &speech, &settings, Utc::now());
                assert!(outcome.complete, "floor {floor}");
                assert!(
                    outcome.profile.speaking_threshold > outcome.profile.noise_floor,
                    "floor {floor} sensitivity {sensitivity}"
                );
            }
        }
    }
}
