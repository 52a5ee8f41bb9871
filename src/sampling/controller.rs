use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::{sync::Mutex, task::JoinHandle, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::{audio::SharedLevelSource, classifier::SampleSink, metrics::MetricsCollector};

use super::loop_worker::{sampling_loop, source_still_available};

/// The one sampling loop in the process. Calibration and live tracking both
/// go through it, so they can never sample at the same time.
pub type SharedSampler = Arc<Mutex<SamplingController>>;

/// Identifies one started loop so an owner only ever stops its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopId(u64);

pub struct SamplingController {
    source: SharedLevelSource,
    metrics: MetricsCollector,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    current: Option<LoopId>,
    next_id: u64,
}

impl SamplingController {
    pub fn new(source: SharedLevelSource, metrics: MetricsCollector) -> Self {
        Self {
            source,
            metrics,
            handle: None,
            cancel_token: None,
            current: None,
            next_id: 0,
        }
    }

    pub fn shared(self) -> SharedSampler {
        Arc::new(Mutex::new(self))
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn source_available(&self) -> bool {
        source_still_available(&self.source)
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn start(&mut self, interval: Duration, sink: Box<dyn SampleSink>) -> Result<LoopId> {
        if self.is_active() {
            bail!("sampling already active");
        }
        // A loop that ended on its own (source gone) leaves a finished handle.
        self.handle = None;
        self.cancel_token = None;
        self.current = None;

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(sampling_loop(
            Arc::clone(&self.source),
            interval,
            sink,
            self.metrics.clone(),
            cancel_token.clone(),
        ));

        self.next_id += 1;
        let id = LoopId(self.next_id);

        info!("sampling loop {} started ({} ms interval)", id.0, interval.as_millis());
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.current = Some(id);
        Ok(id)
    }

    /// Stops the loop only if it is still the one identified by `id`.
    pub async fn stop_loop(&mut self, id: LoopId) -> Result<bool> {
        if self.current != Some(id) {
            return Ok(false);
        }
        self.stop().await.map(|_| true)
    }

    /// Cancels the loop and waits for it, so no sample lands after this
    /// returns.
    pub async fn stop(&mut self) -> Result<()> {
        self.current = None;
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("sampling loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}
