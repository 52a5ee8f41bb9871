pub mod analytics;
pub mod audio;
pub mod calibration;
pub mod classifier;
pub mod commands;
pub mod db;
pub mod eligibility;
pub mod error;
pub mod metrics;
pub mod sampling;
pub mod settings;
pub mod status;
pub mod telephony;
pub mod tracker;
mod utils;

use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::info;
use tokio::sync::Mutex;

use analytics::AnalyticsAggregator;
use audio::{probe_level_source, share, AudioConfig};
use calibration::CalibrationManager;
use db::Database;
use metrics::MetricsCollector;
use sampling::{SamplingController, SharedSampler};
use settings::SettingsStore;
use status::{status_channel, StatusSender};
use telephony::{CallLifecycleMonitor, TelephonyEvent};
use tracker::{CallTracker, FinalizedCall, TrackerConfig};

pub const DATABASE_FILE: &str = "callmeter.sqlite3";
pub const SETTINGS_FILE: &str = "settings.json";

/// Everything the host needs, wired once at startup.
pub struct AppState {
    pub db: Database,
    pub settings: SettingsStore,
    pub sampler: SharedSampler,
    pub metrics: MetricsCollector,
    pub tracker: CallTracker,
    pub calibration: CalibrationManager,
    pub analytics: AnalyticsAggregator,
    pub events: StatusSender,
    monitor: Mutex<CallLifecycleMonitor>,
}

impl AppState {
    /// Opens (or creates) the store and settings under `data_dir` and probes
    /// the audio source.
    pub fn bootstrap(data_dir: &Path, audio: Option<AudioConfig>, debug_mode: bool) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

        let db = Database::new(data_dir.join(DATABASE_FILE))?;
        let store = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;
        let meter = store.settings();

        let audio = audio.unwrap_or_else(|| AudioConfig {
            pcm_source: settings::pcm_source(),
            buffer_samples: meter.sampling.buffer_samples,
        });
        let source = probe_level_source(&audio);

        Ok(Self::assemble(db, store, share(source), debug_mode))
    }

    pub fn assemble(
        db: Database,
        settings: SettingsStore,
        source: audio::SharedLevelSource,
        debug_mode: bool,
    ) -> Self {
        let meter = settings.settings();
        let metrics = MetricsCollector::new();
        let sampler = SamplingController::new(source, metrics.clone()).shared();
        let events = status_channel();

        let tracker = CallTracker::new(
            db.clone(),
            sampler.clone(),
            TrackerConfig::from_settings(&meter, debug_mode),
            events.clone(),
        );
        let calibration = CalibrationManager::new(
            db.clone(),
            sampler.clone(),
            meter.calibration.clone(),
            meter.sampling.interval_ms,
            events.clone(),
        );
        let analytics = AnalyticsAggregator::new(db.clone());

        Self {
            db,
            settings,
            sampler,
            metrics,
            tracker,
            calibration,
            analytics,
            events,
            monitor: Mutex::new(CallLifecycleMonitor::new()),
        }
    }

    /// Feeds one telephony transition through the lifecycle monitor and on to
    /// the tracker. Returns the finalized call when a tracked one just ended.
    pub async fn on_telephony_event(&self, event: TelephonyEvent) -> Result<Option<FinalizedCall>> {
        let lifecycle = self.monitor.lock().await.on_event(event);
        match lifecycle {
            Some(lifecycle) => self.tracker.handle_lifecycle(lifecycle).await,
            None => Ok(None),
        }
    }

    pub async fn shutdown(&self) -> Result<Option<FinalizedCall>> {
        info!("callmeter shutting down");
        self.tracker.shutdown().await
    }
}

pub fn init_logging() {
    // Reads RUST_LOG; defaults to info.
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
