//! Two-phase microphone calibration: ambient silence, then the user talking.

mod profile;

pub use profile::{compute_profile, CalibrationOutcome, MIN_SPEAKING_THRESHOLD};

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use tokio::time::{self, Duration};

use crate::{
    classifier::{AmplitudeSample, SampleSink},
    db::{persist_with_retry, CalibrationProfile, Database},
    error::{CalibrationError, PersistenceFailure},
    sampling::SharedSampler,
    settings::CalibrationSettings,
    status::{emit, StatusEvent, StatusSender},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CalibrationPhase {
    /// The user stays quiet while the noise floor is measured.
    Silence,
    /// The user reads aloud at a normal speaking volume.
    Speech,
}

#[derive(Debug, Default)]
struct PhaseLevels {
    silence: Vec<f64>,
    speech: Vec<f64>,
}

/// Routes readings to a phase by their offset from loop start.
struct PhaseSink {
    phase_ms: u64,
    levels: Arc<Mutex<PhaseLevels>>,
}

impl SampleSink for PhaseSink {
    fn on_sample(&mut self, sample: AmplitudeSample) {
        let mut levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);
        if sample.offset_ms < self.phase_ms {
            levels.silence.push(sample.level);
        } else if sample.offset_ms < self.phase_ms.saturating_mul(2) {
            levels.speech.push(sample.level);
        }
    }
}

pub struct CalibrationManager {
    db: Database,
    sampler: SharedSampler,
    settings: CalibrationSettings,
    interval: Duration,
    events: StatusSender,
}

impl CalibrationManager {
    pub fn new(
        db: Database,
        sampler: SharedSampler,
        settings: CalibrationSettings,
        interval_ms: u64,
        events: StatusSender,
    ) -> Self {
        Self {
            db,
            sampler,
            settings,
            interval: Duration::from_millis(interval_ms),
            events,
        }
    }

    /// Runs both phases on the shared sampling loop and replaces the stored
    /// profile with the result. Fails only if the loop is already in use.
    pub async fn run(&self) -> Result<CalibrationOutcome, CalibrationError> {
        let phase_ms = self.settings.phase_ms;
        let levels = Arc::new(Mutex::new(PhaseLevels::default()));

        let loop_id = {
            let mut sampler = self.sampler.lock().await;
            if sampler.is_active() {
                return Err(CalibrationError::SamplerBusy(
                    "another calibration or a tracked call is sampling".to_string(),
                ));
            }
            if sampler.source_available() {
                let sink = PhaseSink {
                    phase_ms,
                    levels: Arc::clone(&levels),
                };
                let id = sampler
                    .start(self.interval, Box::new(sink))
                    .map_err(|err| CalibrationError::SamplerBusy(format!("{err:#}")))?;
                Some(id)
            } else {
                warn!("Calibration started without an audio source; using fallback thresholds");
                None
            }
        };

        if let Some(loop_id) = loop_id {
            for phase in [CalibrationPhase::Silence, CalibrationPhase::Speech] {
                info!("Calibration phase {phase:?} for {phase_ms} ms");
                emit(
                    &self.events,
                    StatusEvent::CalibrationProgress { phase, phase_ms },
                );
                time::sleep(Duration::from_millis(phase_ms)).await;
            }

            self.sampler
                .lock()
                .await
                .stop_loop(loop_id)
                .await
                .map_err(|err| CalibrationError::Sampling(format!("{err:#}")))?;
        }

        let (silence, speech) = {
            let mut levels = levels.lock().unwrap_or_else(PoisonError::into_inner);
            (
                std::mem::take(&mut levels.silence),
                std::mem::take(&mut levels.speech),
            )
        };

        let mut outcome = compute_profile(&silence, &speech, &self.settings, Utc::now());
        if outcome.complete {
            info!(
                "Calibration complete: noise floor {:.1}, threshold {:.1} ({} of {} speech samples qualified)",
                outcome.profile.noise_floor,
                outcome.profile.speaking_threshold,
                outcome.qualifying_samples,
                outcome.speech_samples
            );
        } else {
            warn!(
                "Calibration incomplete ({} silence / {} speech samples); storing fallback thresholds",
                outcome.silence_samples, outcome.speech_samples
            );
        }

        outcome.persisted = self.save(&outcome.profile).await.is_ok();
        emit(
            &self.events,
            StatusEvent::CalibrationFinished {
                profile: outcome.profile.clone(),
                complete: outcome.complete,
            },
        );
        Ok(outcome)
    }

    /// Stores the documented default thresholds without sampling.
    pub async fn skip(&self) -> Result<CalibrationProfile, PersistenceFailure> {
        let profile = CalibrationProfile::skipped(Utc::now());
        self.save(&profile).await?;
        info!("Calibration skipped; default thresholds stored");
        Ok(profile)
    }

    pub async fn current_profile(&self) -> CalibrationProfile {
        load_profile(&self.db).await
    }

    async fn save(&self, profile: &CalibrationProfile) -> Result<(), PersistenceFailure> {
        let result = persist_with_retry("calibration profile", || {
            self.db.save_calibration_profile(profile)
        })
        .await;

        if let Err(failure) = &result {
            error!("{failure:#}");
            emit(
                &self.events,
                StatusEvent::Notice {
                    message: "Calibration could not be saved; previous thresholds remain in use"
                        .to_string(),
                },
            );
        }
        result
    }
}

/// The stored profile, or the default thresholds when none is stored or the
/// store cannot be read.
pub async fn load_profile(db: &Database) -> CalibrationProfile {
    match db.get_calibration_profile().await {
        Ok(Some(profile)) => profile,
        Ok(None) => CalibrationProfile::fallback(Utc::now()),
        Err(err) => {
            warn!("Failed to load calibration profile, using defaults: {err:#}");
            CalibrationProfile::fallback(Utc::now())
        }
    }
}
