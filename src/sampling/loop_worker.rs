use std::sync::{Arc, TryLockError};

use chrono::Utc;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    audio::SharedLevelSource,
    classifier::{AmplitudeSample, SampleSink},
    error::AudioUnavailable,
    metrics::{MetricsCollector, ReadMetrics},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub async fn sampling_loop(
    source: SharedLevelSource,
    interval: Duration,
    mut sink: Box<dyn SampleSink>,
    metrics: MetricsCollector,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let started = Instant::now();
    let mut samples: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let offset_ms = started.elapsed().as_millis() as u64;
                let read_start = Instant::now();
                let read = tokio::task::spawn_blocking({
                    let source = Arc::clone(&source);
                    move || read_level(&source)
                });

                // A blocked read must not hold up stop(); the read is left to
                // finish on its own and its result is dropped.
                let joined = tokio::select! {
                    joined = read => Some(joined),
                    _ = cancel_token.cancelled() => None,
                };
                let Some(joined) = joined.filter(|_| !cancel_token.is_cancelled()) else {
                    metrics.record_discarded().await;
                    log_info!("sampling loop cancelled mid-read after {} samples", samples);
                    break;
                };

                let read_ms = read_start.elapsed().as_millis() as u64;
                match joined {
                    Ok(Ok(level)) => {
                        samples += 1;
                        metrics
                            .record_read(ReadMetrics { timestamp: Utc::now(), read_ms, level: Some(level) })
                            .await;
                        sink.on_sample(AmplitudeSample { level, offset_ms });
                    }
                    Ok(Err(err)) => {
                        metrics
                            .record_read(ReadMetrics { timestamp: Utc::now(), read_ms, level: None })
                            .await;
                        sink.on_unavailable(&err);
                        if !source_still_available(&source) {
                            log_warn!("level source gone, sampling loop exiting: {err}");
                            break;
                        }
                    }
                    Err(join_err) => {
                        log_error!("level read worker failed: {join_err}");
                        break;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("sampling loop shutting down after {} samples", samples);
                break;
            }
        }
    }
}

fn read_level(source: &SharedLevelSource) -> Result<f64, AudioUnavailable> {
    let mut guard = source
        .lock()
        .map_err(|_| AudioUnavailable::new("level source lock poisoned"))?;
    guard.sample_level()
}

pub(crate) fn source_still_available(source: &SharedLevelSource) -> bool {
    match source.try_lock() {
        Ok(guard) => guard.is_available(),
        // Someone is reading it right now.
        Err(TryLockError::WouldBlock) => true,
        Err(TryLockError::Poisoned(_)) => false,
    }
}
