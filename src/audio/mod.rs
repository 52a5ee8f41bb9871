//! Microphone level sources.
//!
//! Every strategy reports a single loudness figure per call in the same unit
//! (linear RMS of 16-bit PCM) so calibration thresholds and live readings are
//! always comparable. The strategy is picked once at startup by
//! [`probe_level_source`].

pub mod level;
pub mod pcm;
#[cfg(test)]
pub(crate) mod scripted;

use std::{
    fs::File,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use log::{info, warn};

use crate::error::AudioUnavailable;

pub use pcm::PcmLevelSource;

pub trait LevelSource: Send {
    /// Blocks for at most one buffer's worth of audio.
    fn sample_level(&mut self) -> Result<f64, AudioUnavailable>;

    /// Capability check used before a loop is started.
    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "unknown_level_source"
    }
}

/// Level source shared between calibration and live tracking. Only the
/// sampling loop locks it, from a blocking worker.
pub type SharedLevelSource = Arc<Mutex<Box<dyn LevelSource>>>;

pub fn share(source: Box<dyn LevelSource>) -> SharedLevelSource {
    Arc::new(Mutex::new(source))
}

/// Stand-in when no capture path exists (no device, permission refused).
#[derive(Debug, Clone)]
pub struct UnavailableSource {
    reason: String,
}

impl UnavailableSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl LevelSource for UnavailableSource {
    fn sample_level(&mut self) -> Result<f64, AudioUnavailable> {
        Err(AudioUnavailable::new(self.reason.clone()))
    }

    fn is_available(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Raw PCM stream (file or FIFO). `None` means no capture path.
    pub pcm_source: Option<PathBuf>,
    pub buffer_samples: usize,
}

pub fn probe_level_source(config: &AudioConfig) -> Box<dyn LevelSource> {
    let Some(path) = config.pcm_source.as_ref() else {
        warn!("No audio capture path configured; speaking/listening will be estimated");
        return Box::new(UnavailableSource::new("no capture path configured"));
    };

    match File::open(path) {
        Ok(file) => {
            info!("Using PCM level source at {}", path.display());
            Box::new(PcmLevelSource::new(file, config.buffer_samples))
        }
        Err(err) => {
            warn!("Audio capture path {} unavailable: {err}", path.display());
            Box::new(UnavailableSource::new(format!(
                "cannot open {}: {err}",
                path.display()
            )))
        }
    }
}
