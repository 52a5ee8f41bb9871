use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

pub const DATA_DIR_ENV: &str = "CALLMETER_DATA_DIR";
pub const PCM_SOURCE_ENV: &str = "CALLMETER_PCM_SOURCE";
pub const DEBUG_ENV: &str = "CALLMETER_DEBUG";

const DEFAULT_DATA_DIR: &str = "./callmeter-data";
const MIN_INTERVAL_MS: u64 = 10;
const MIN_GRACE_SAMPLES: u32 = 3;
const MAX_GRACE_SAMPLES: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SamplingSettings {
    pub interval_ms: u64,
    /// Consecutive quiet samples before quiet time counts as listening.
    pub grace_samples: u32,
    /// PCM samples per level reading.
    pub buffer_samples: usize,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            grace_samples: 5,
            buffer_samples: 1_600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CalibrationSettings {
    pub phase_ms: u64,
    /// Fraction of the way from the noise floor to the average speaking
    /// level where the threshold is placed.
    pub sensitivity: f64,
    /// Speech samples must exceed `noise_floor * speech_margin` to count.
    pub speech_margin: f64,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            phase_ms: 8_000,
            sensitivity: 0.3,
            speech_margin: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CompletenessSettings {
    pub min_tracked_ratio: f64,
    pub fallback_speaking_ratio: f64,
}

impl Default for CompletenessSettings {
    fn default() -> Self {
        Self {
            min_tracked_ratio: 0.8,
            fallback_speaking_ratio: 0.4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MeterSettings {
    pub sampling: SamplingSettings,
    pub calibration: CalibrationSettings,
    pub completeness: CompletenessSettings,
}

impl MeterSettings {
    /// Pulls out-of-range values back into range instead of rejecting the file.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        self.sampling.interval_ms = self.sampling.interval_ms.max(MIN_INTERVAL_MS);
        self.sampling.grace_samples = self
            .sampling
            .grace_samples
            .clamp(MIN_GRACE_SAMPLES, MAX_GRACE_SAMPLES);
        self.sampling.buffer_samples = self.sampling.buffer_samples.max(1);

        let sensitivity = self.calibration.sensitivity;
        if !(sensitivity > 0.0 && sensitivity <= 1.0) {
            warn!("sensitivity {sensitivity} out of range (0, 1], using default");
            self.calibration.sensitivity = defaults.calibration.sensitivity;
        }
        if !(self.calibration.speech_margin >= 1.0) {
            self.calibration.speech_margin = defaults.calibration.speech_margin;
        }

        let completeness = &mut self.completeness;
        if !(0.0..=1.0).contains(&completeness.min_tracked_ratio) {
            completeness.min_tracked_ratio = defaults.completeness.min_tracked_ratio;
        }
        if !(0.0..=1.0).contains(&completeness.fallback_speaking_ratio) {
            completeness.fallback_speaking_ratio = defaults.completeness.fallback_speaking_ratio;
        }

        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<MeterSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str::<MeterSettings>(&contents)
                .unwrap_or_else(|err| {
                    warn!("Ignoring unreadable settings file {}: {err}", path.display());
                    MeterSettings::default()
                })
                .validated()
        } else {
            MeterSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> MeterSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: MeterSettings) -> Result<MeterSettings> {
        let settings = settings.validated();
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&settings)?;
        *guard = settings.clone();
        Ok(settings)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: MeterSettings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = data.validated();
        Ok(())
    }

    fn persist(&self, data: &MeterSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

pub fn data_dir() -> PathBuf {
    env::var_os(DATA_DIR_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

pub fn pcm_source() -> Option<PathBuf> {
    env::var_os(PCM_SOURCE_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

pub fn debug_mode() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
