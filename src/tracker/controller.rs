use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time,
};

use crate::{
    calibration::load_profile,
    classifier::{Accumulators, ClassifierConfig, VoiceActivityClassifier},
    db::{persist_with_retry, CallRecord, Database, TrackedNumber},
    eligibility::EligibilityFilter,
    sampling::SharedSampler,
    settings::MeterSettings,
    status::{emit, StatusEvent, StatusSender},
    telephony::LifecycleEvent,
};

use super::{
    finalize::{finalize_times, CompletenessPolicy},
    TrackerSnapshot, TrackerState, TrackerStatus,
};

const HEARTBEAT_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub interval_ms: u64,
    pub grace_samples: u32,
    pub completeness: CompletenessPolicy,
    pub heartbeat_every_ticks: u32,
}

impl TrackerConfig {
    pub fn from_settings(settings: &MeterSettings, debug_mode: bool) -> Self {
        Self {
            interval_ms: settings.sampling.interval_ms,
            grace_samples: settings.sampling.grace_samples,
            completeness: CompletenessPolicy::from(&settings.completeness),
            heartbeat_every_ticks: if debug_mode { 1 } else { 10 },
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::from_settings(&MeterSettings::default(), false)
    }
}

/// A call that has ended. `persisted` is false when both store writes
/// failed and the record was discarded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedCall {
    pub record: CallRecord,
    pub persisted: bool,
}

/// Turns eligible call sessions into call records.
#[derive(Clone)]
pub struct CallTracker {
    state: Arc<Mutex<TrackerState>>,
    db: Database,
    sampler: SharedSampler,
    accumulators: Arc<Accumulators>,
    eligibility: Arc<Mutex<EligibilityFilter>>,
    config: TrackerConfig,
    events: StatusSender,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl CallTracker {
    pub fn new(db: Database, sampler: SharedSampler, config: TrackerConfig, events: StatusSender) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState::new())),
            db,
            sampler,
            accumulators: Arc::new(Accumulators::new()),
            eligibility: Arc::new(Mutex::new(EligibilityFilter::default())),
            config,
            events,
            ticker: Arc::new(Mutex::new(None)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    /// Returns the finalized call when `event` ended a tracked one.
    pub async fn handle_lifecycle(&self, event: LifecycleEvent) -> Result<Option<FinalizedCall>> {
        match event {
            LifecycleEvent::SessionStarted { phone_number } => {
                let Some(number) = phone_number else {
                    info!("Call started without a number; not tracking");
                    return Ok(None);
                };

                match self.resolve(&number).await {
                    Some(tracked) => {
                        self.start_tracking(tracked).await?;
                    }
                    None => info!("Call with untracked number {number} ignored"),
                }
                Ok(None)
            }
            LifecycleEvent::SessionEnded { .. } => {
                if self.status().await == TrackerStatus::Tracking {
                    self.stop_tracking().await.map(Some)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Looks `number` up against the freshest tracked-number list, falling
    /// back to the last good list when the store cannot be read.
    async fn resolve(&self, number: &str) -> Option<TrackedNumber> {
        let mut filter = self.eligibility.lock().await;
        match EligibilityFilter::load(&self.db).await {
            Ok(fresh) => *filter = fresh,
            Err(err) => warn!("Failed to reload tracked numbers, using cached list: {err:#}"),
        }
        filter.lookup(number).cloned()
    }

    pub async fn start_tracking(&self, tracked: TrackedNumber) -> Result<TrackerSnapshot> {
        {
            let state = self.state.lock().await;
            if state.status != TrackerStatus::Idle {
                bail!("tracking already active");
            }
        }

        self.accumulators.reset();
        let profile = load_profile(&self.db).await;
        let classifier = VoiceActivityClassifier::with_accumulators(
            ClassifierConfig::from_profile(
                &profile,
                self.config.grace_samples,
                self.config.interval_ms,
            ),
            Arc::clone(&self.accumulators),
        );

        let started_at = Utc::now();
        let loop_id = {
            let mut sampler = self.sampler.lock().await;
            if !sampler.source_available() {
                warn!(
                    "Audio unavailable for call with {}; measuring duration only",
                    tracked.label
                );
                None
            } else {
                match sampler.start(
                    Duration::from_millis(self.config.interval_ms),
                    Box::new(classifier),
                ) {
                    Ok(id) => Some(id),
                    Err(err) => {
                        warn!("Sampling not started for {}: {err:#}", tracked.label);
                        None
                    }
                }
            }
        };

        {
            let mut state = self.state.lock().await;
            state.begin_call(&tracked, started_at, Instant::now(), loop_id);
        }

        info!(
            "Tracking call with {} (threshold {:.1}{})",
            tracked.label,
            profile.speaking_threshold,
            if loop_id.is_some() { "" } else { ", no audio" }
        );

        self.spawn_ticker().await;

        let snapshot = self.snapshot().await;
        emit(&self.events, StatusEvent::TrackingStarted(snapshot.clone()));
        Ok(snapshot)
    }

    pub async fn stop_tracking(&self) -> Result<FinalizedCall> {
        let (state, total_ms) = {
            let mut guard = self.state.lock().await;
            if guard.status != TrackerStatus::Tracking {
                bail!("no call is being tracked");
            }
            let total_ms = guard.begin_finalize();
            (guard.clone(), total_ms)
        };

        if let Some(loop_id) = state.loop_id {
            if let Err(err) = self.sampler.lock().await.stop_loop(loop_id).await {
                error!("Failed to stop sampling loop: {err:#}");
            }
        }
        self.cancel_ticker().await;

        let measured = self.accumulators.snapshot();
        self.state.lock().await.clear();

        let times = finalize_times(
            measured.speaking_ms,
            measured.listening_ms,
            total_ms,
            &self.config.completeness,
        );

        let label = state.label.ok_or_else(|| anyhow!("tracked call has no label"))?;
        let record = CallRecord::new(
            label,
            state.phone_number.unwrap_or_default(),
            times.speaking_ms,
            times.listening_ms,
            total_ms,
            state.started_at.unwrap_or_else(Utc::now),
        );

        info!(
            "Call with {} finalized: {} ms total, measured {}/{} ms, stored {}/{} ms ({:?})",
            record.label,
            total_ms,
            measured.speaking_ms,
            measured.listening_ms,
            record.speaking_time_ms,
            record.listening_time_ms,
            times.adjustment
        );

        let persisted = match persist_with_retry("call record", || {
            self.db.insert_call_record(&record)
        })
        .await
        {
            Ok(()) => true,
            Err(failure) => {
                error!("{failure:#}");
                emit(
                    &self.events,
                    StatusEvent::Notice {
                        message: format!(
                            "The call with {} could not be saved and was discarded",
                            record.label
                        ),
                    },
                );
                false
            }
        };

        emit(
            &self.events,
            StatusEvent::CallFinalized {
                record: record.clone(),
                persisted,
            },
        );
        Ok(FinalizedCall { record, persisted })
    }

    /// Finalizes a call still open when the host shuts down.
    pub async fn shutdown(&self) -> Result<Option<FinalizedCall>> {
        if self.status().await == TrackerStatus::Tracking {
            info!("Shutting down during a tracked call; finalizing it");
            return self.stop_tracking().await.map(Some);
        }
        self.cancel_ticker().await;
        Ok(None)
    }

    pub async fn status(&self) -> TrackerStatus {
        self.state.lock().await.status
    }

    pub async fn snapshot(&self) -> TrackerSnapshot {
        build_snapshot(&self.state, &self.accumulators, &self.sampler).await
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = Arc::clone(&self.state);
        let accumulators = Arc::clone(&self.accumulators);
        let sampler = Arc::clone(&self.sampler);
        let events = self.events.clone();
        let heartbeat_every = self.config.heartbeat_every_ticks.max(1);

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(HEARTBEAT_TICK);
            // The first tick completes immediately.
            interval.tick().await;
            let mut ticks: u32 = 0;
            loop {
                interval.tick().await;
                ticks = ticks.wrapping_add(1);
                if ticks % heartbeat_every != 0 {
                    continue;
                }

                let snapshot = build_snapshot(&state, &accumulators, &sampler).await;
                if snapshot.status != TrackerStatus::Tracking {
                    break;
                }
                emit(&events, StatusEvent::Heartbeat(snapshot));
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }
}

async fn build_snapshot(
    state: &Mutex<TrackerState>,
    accumulators: &Accumulators,
    sampler: &SharedSampler,
) -> TrackerSnapshot {
    let state = state.lock().await.clone();
    let totals = accumulators.snapshot();
    let audio_available = state.loop_id.is_some() && sampler.lock().await.is_active();

    TrackerSnapshot {
        status: state.status,
        elapsed_ms: state.elapsed_ms(),
        label: state.label,
        phone_number: state.phone_number,
        started_at: state.started_at,
        speaking_ms: totals.speaking_ms,
        listening_ms: totals.listening_ms,
        audio_available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        audio::{scripted::ScriptedSource, share, LevelSource, UnavailableSource},
        db::RecordQuery,
        metrics::MetricsCollector,
        sampling::SamplingController,
        status::status_channel,
    };

    fn tracker(db: &Database, source: Box<dyn LevelSource>) -> CallTracker {
        let sampler = SamplingController::new(share(source), MetricsCollector::new()).shared();
        let config = TrackerConfig {
            interval_ms: 5,
            ..TrackerConfig::default()
        };
        CallTracker::new(db.clone(), sampler, config, status_channel())
    }

    fn started(number: &str) -> LifecycleEvent {
        LifecycleEvent::SessionStarted {
            phone_number: Some(number.to_string()),
        }
    }

    fn ended(number: &str) -> LifecycleEvent {
        LifecycleEvent::SessionEnded {
            phone_number: Some(number.to_string()),
        }
    }

    #[tokio::test]
    async fn untracked_numbers_are_ignored() {
        let db = Database::open_in_memory().unwrap();
        let tracker = tracker(&db, Box::new(ScriptedSource::constant(5_000.0)));

        assert!(tracker.handle_lifecycle(started("+15550199")).await.unwrap().is_none());
        assert_eq!(tracker.status().await, TrackerStatus::Idle);
        assert!(tracker.handle_lifecycle(ended("+15550199")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tracked_call_produces_one_record() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_tracked_number("+1 555 0100", "Alice", None).await.unwrap();
        let tracker = tracker(&db, Box::new(ScriptedSource::constant(5_000.0)));
        let mut events = tracker.subscribe();

        tracker.handle_lifecycle(started("+15550100")).await.unwrap();
        assert_eq!(tracker.status().await, TrackerStatus::Tracking);
        assert!(matches!(events.recv().await.unwrap(), StatusEvent::TrackingStarted(_)));

        tokio::time::sleep(Duration::from_millis(40)).await;
        let finalized = tracker
            .handle_lifecycle(ended("+15550100"))
            .await
            .unwrap()
            .expect("record for tracked call");
        assert!(finalized.persisted);
        let record = finalized.record;

        assert_eq!(record.label, "Alice");
        assert_eq!(record.phone_number, "+15550100");
        assert!(record.total_duration_ms >= 40);
        assert!(record.speaking_time_ms > 0);
        assert!((0.0..=100.0).contains(&record.talk_ratio));
        assert_eq!(tracker.status().await, TrackerStatus::Idle);

        let stored = db.list_call_records(&RecordQuery::all()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, record.id);
        assert_eq!(stored[0].speaking_time_ms, record.speaking_time_ms);
    }

    #[tokio::test]
    async fn accumulators_frozen_after_stop() {
        let db = Database::open_in_memory().unwrap();
        let tracker = tracker(&db, Box::new(ScriptedSource::constant(5_000.0)));
        let alice = TrackedNumber {
            phone_number: "+15550100".into(),
            label: "Alice".into(),
            source_id: None,
        };

        tracker.start_tracking(alice).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        tracker.stop_tracking().await.unwrap();

        let frozen = tracker.accumulators.snapshot();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(tracker.accumulators.snapshot(), frozen);
        assert!(!tracker.sampler.lock().await.is_active());
    }

    #[tokio::test]
    async fn unavailable_audio_still_records_with_fixed_split() {
        let db = Database::open_in_memory().unwrap();
        let tracker = tracker(&db, Box::new(UnavailableSource::new("permission denied")));
        let bob = TrackedNumber {
            phone_number: "+15550101".into(),
            label: "Bob".into(),
            source_id: None,
        };

        let snapshot = tracker.start_tracking(bob).await.unwrap();
        assert!(!snapshot.audio_available);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let record = tracker.stop_tracking().await.unwrap().record;
        let expected_speaking = (record.total_duration_ms as f64 * 0.4).round() as u64;
        assert_eq!(record.speaking_time_ms, expected_speaking);
        assert_eq!(
            record.speaking_time_ms + record.listening_time_ms,
            record.total_duration_ms
        );
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let tracker = tracker(&db, Box::new(UnavailableSource::new("none")));
        let carol = TrackedNumber {
            phone_number: "+15550102".into(),
            label: "Carol".into(),
            source_id: None,
        };

        tracker.start_tracking(carol.clone()).await.unwrap();
        let err = tracker.start_tracking(carol).await.unwrap_err();
        assert!(err.to_string().contains("already active"));
        tracker.stop_tracking().await.unwrap();
        assert!(tracker.stop_tracking().await.is_err());
    }

    #[tokio::test]
    async fn failed_save_is_reported_as_unpersisted() {
        let db = Database::open_in_memory().unwrap();
        db.execute(|conn| {
            conn.execute("DROP TABLE call_records", [])?;
            Ok(())
        })
        .await
        .unwrap();

        let tracker = tracker(&db, Box::new(UnavailableSource::new("none")));
        let mut events = tracker.subscribe();
        let dave = TrackedNumber {
            phone_number: "+15550103".into(),
            label: "Dave".into(),
            source_id: None,
        };

        tracker.start_tracking(dave).await.unwrap();
        let finalized = tracker.stop_tracking().await.unwrap();
        assert_eq!(finalized.record.label, "Dave");
        assert!(!finalized.persisted);

        let mut saw_notice = false;
        let mut saw_unpersisted = false;
        while let Ok(event) = events.try_recv() {
            match event {
                StatusEvent::Notice { .. } => saw_notice = true,
                StatusEvent::CallFinalized { persisted, .. } => saw_unpersisted = !persisted,
                _ => {}
            }
        }
        assert!(saw_notice);
        assert!(saw_unpersisted);
    }

    #[tokio::test]
    async fn shutdown_finalizes_open_call() {
        let db = Database::open_in_memory().unwrap();
        let tracker = tracker(&db, Box::new(UnavailableSource::new("none")));
        assert!(tracker.shutdown().await.unwrap().is_none());

        let erin = TrackedNumber {
            phone_number: "+15550104".into(),
            label: "Erin".into(),
            source_id: None,
        };
        tracker.start_tracking(erin).await.unwrap();
        let finalized = tracker.shutdown().await.unwrap().expect("open call finalized");
        assert_eq!(finalized.record.label, "Erin");
        assert_eq!(db.list_call_records(&RecordQuery::all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn start_refused_while_previous_call_finalizes() {
        let db = Database::open_in_memory().unwrap();
        let tracker = tracker(&db, Box::new(ScriptedSource::constant(5_000.0)));
        let frank = TrackedNumber {
            phone_number: "+15550105".into(),
            label: "Frank".into(),
            source_id: None,
        };

        tracker.start_tracking(frank.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Holding the sampler parks stop_tracking before the totals are read.
        let sampler_guard = tracker.sampler.lock().await;
        let stopping = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.stop_tracking().await }
        });
        while tracker.status().await != TrackerStatus::Finalizing {
            tokio::task::yield_now().await;
        }

        let err = tracker.start_tracking(frank).await.unwrap_err();
        assert!(err.to_string().contains("already active"));
        assert!(tracker.accumulators.snapshot().speaking_ms > 0);

        drop(sampler_guard);
        let finalized = stopping.await.unwrap().unwrap();
        assert!(finalized.record.speaking_time_ms > 0);
        assert_eq!(tracker.status().await, TrackerStatus::Idle);
    }

    #[tokio::test]
    async fn classification_follows_calibrated_threshold() {
        use crate::{
            audio::scripted::TimedSource, calibration::CalibrationManager,
            db::models::calibration_profile::DEFAULT_SPEAKING_THRESHOLD,
            settings::CalibrationSettings,
        };

        const CALLER_LEVEL: f64 = 1_800.0;
        assert!(CALLER_LEVEL > DEFAULT_SPEAKING_THRESHOLD);

        // Quiet room, then speech, then a caller level between the default
        // threshold and the calibrated one.
        let source = TimedSource::new([(80, 200.0), (200, 8_000.0)], CALLER_LEVEL);
        let db = Database::open_in_memory().unwrap();
        let sampler =
            SamplingController::new(share(Box::new(source)), MetricsCollector::new()).shared();
        let events = status_channel();
        let calibration = CalibrationManager::new(
            db.clone(),
            Arc::clone(&sampler),
            CalibrationSettings {
                phase_ms: 60,
                ..CalibrationSettings::default()
            },
            5,
            events.clone(),
        );

        let outcome = calibration.run().await.unwrap();
        assert!(outcome.complete);
        assert!(outcome.profile.speaking_threshold > CALLER_LEVEL);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let config = TrackerConfig {
            interval_ms: 5,
            ..TrackerConfig::default()
        };
        let tracker = CallTracker::new(db.clone(), sampler, config, events);
        let grace = TrackedNumber {
            phone_number: "+15550106".into(),
            label: "Grace".into(),
            source_id: None,
        };

        tracker.start_tracking(grace).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        let measured = tracker.accumulators.snapshot();
        tracker.stop_tracking().await.unwrap();

        assert_eq!(measured.speaking_ms, 0);
        assert!(measured.listening_ms > 0);
    }
}
