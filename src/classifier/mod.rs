//! Speaking/listening classification of periodic microphone levels.
//!
//! A level above the speaking threshold credits the whole sampling interval
//! to speaking. Quiet intervals are only credited to listening once the run
//! of consecutive quiet samples reaches the grace count, so short pauses
//! between words do not count as listening. Intervals inside the grace window
//! are credited to neither side and are never back-filled.

mod accumulators;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{db::CalibrationProfile, error::AudioUnavailable};

pub use accumulators::{AccumulatorSnapshot, Accumulators};

pub const DEFAULT_GRACE_SAMPLES: u32 = 5;
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 100;

/// One level reading taken by the sampling loop. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmplitudeSample {
    pub level: f64,
    /// Milliseconds since the loop started.
    pub offset_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Classification {
    Speaking,
    Listening,
    /// Quiet, but still inside the grace window.
    Provisional,
}

/// Receives every reading produced by a sampling loop.
pub trait SampleSink: Send + 'static {
    fn on_sample(&mut self, sample: AmplitudeSample);

    fn on_unavailable(&mut self, _err: &AudioUnavailable) {}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    pub speaking_threshold: f64,
    pub grace_samples: u32,
    pub interval_ms: u64,
}

impl ClassifierConfig {
    pub fn from_profile(profile: &CalibrationProfile, grace_samples: u32, interval_ms: u64) -> Self {
        Self {
            speaking_threshold: profile.speaking_threshold,
            grace_samples: grace_samples.max(1),
            interval_ms,
        }
    }
}

pub struct VoiceActivityClassifier {
    config: ClassifierConfig,
    silent_run: u32,
    accumulators: Arc<Accumulators>,
}

impl VoiceActivityClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self::with_accumulators(config, Arc::new(Accumulators::new()))
    }

    /// Writes into accumulators owned by someone else (the call tracker).
    pub fn with_accumulators(config: ClassifierConfig, accumulators: Arc<Accumulators>) -> Self {
        Self {
            config,
            silent_run: 0,
            accumulators,
        }
    }

    pub fn classify(&mut self, sample: AmplitudeSample) -> Classification {
        if sample.level > self.config.speaking_threshold {
            self.silent_run = 0;
            self.accumulators.credit_speaking(self.config.interval_ms);
            return Classification::Speaking;
        }

        self.silent_run = self.silent_run.saturating_add(1);
        if self.silent_run >= self.config.grace_samples {
            self.accumulators.credit_listening(self.config.interval_ms);
            Classification::Listening
        } else {
            Classification::Provisional
        }
    }

    pub fn reset(&mut self) {
        self.silent_run = 0;
        self.accumulators.reset();
    }

    pub fn accumulators(&self) -> Arc<Accumulators> {
        Arc::clone(&self.accumulators)
    }

    pub fn snapshot(&self) -> AccumulatorSnapshot {
        self.accumulators.snapshot()
    }

    pub fn silent_run(&self) -> u32 {
        self.silent_run
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }
}

impl SampleSink for VoiceActivityClassifier {
    fn on_sample(&mut self, sample: AmplitudeSample) {
        self.classify(sample);
    }
}
