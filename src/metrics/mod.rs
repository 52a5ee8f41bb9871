mod types;

pub use types::{MetricsSnapshot, ReadMetrics, SystemMetrics};

use std::sync::Arc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::Mutex;

const MAX_RECENT_READS: usize = 20;

/// Counters for the sampling loop plus process CPU/RSS.
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    recent_reads: Vec<ReadMetrics>,
    sample_count: u64,
    unavailable_count: u64,
    discarded_count: u64,
    peak_level: f64,
    system: System,
    pid: Pid,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());

        // Baseline refresh; CPU usage is a delta between refreshes.
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        Self {
            inner: Arc::new(Mutex::new(MetricsState {
                recent_reads: Vec::with_capacity(MAX_RECENT_READS),
                sample_count: 0,
                unavailable_count: 0,
                discarded_count: 0,
                peak_level: 0.0,
                system,
                pid,
            })),
        }
    }

    pub async fn record_read(&self, metrics: ReadMetrics) {
        let mut state = self.inner.lock().await;

        match metrics.level {
            Some(level) => {
                state.sample_count += 1;
                if level > state.peak_level {
                    state.peak_level = level;
                }
            }
            None => state.unavailable_count += 1,
        }

        state.recent_reads.push(metrics);
        if state.recent_reads.len() > MAX_RECENT_READS {
            state.recent_reads.remove(0);
        }
    }

    /// A read that finished after its loop was cancelled.
    pub async fn record_discarded(&self) {
        self.inner.lock().await.discarded_count += 1;
    }

    pub async fn get_snapshot(&self) -> MetricsSnapshot {
        let mut state = self.inner.lock().await;
        let pid = state.pid;

        state.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        let system_metrics = if let Some(process) = state.system.process(pid) {
            SystemMetrics {
                cpu_percent: process.cpu_usage(),
                memory_mb: process.memory() as f64 / 1024.0 / 1024.0,
            }
        } else {
            SystemMetrics {
                cpu_percent: 0.0,
                memory_mb: 0.0,
            }
        };

        MetricsSnapshot {
            system: system_metrics,
            recent_reads: state.recent_reads.clone(),
            sample_count: state.sample_count,
            unavailable_count: state.unavailable_count,
            discarded_count: state.discarded_count,
            peak_level: state.peak_level,
        }
    }

    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        let pid = state.pid;
        state.recent_reads.clear();
        state.sample_count = 0;
        state.unavailable_count = 0;
        state.discarded_count = 0;
        state.peak_level = 0.0;
        state.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MetricsCollector {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn read(level: Option<f64>) -> ReadMetrics {
        ReadMetrics {
            timestamp: Utc::now(),
            read_ms: 1,
            level,
        }
    }

    #[tokio::test]
    async fn counts_samples_and_unavailable_reads() {
        let metrics = MetricsCollector::new();
        metrics.record_read(read(Some(300.0))).await;
        metrics.record_read(read(Some(1_200.0))).await;
        metrics.record_read(read(None)).await;
        metrics.record_discarded().await;

        let snapshot = metrics.get_snapshot().await;
        assert_eq!(snapshot.sample_count, 2);
        assert_eq!(snapshot.unavailable_count, 1);
        assert_eq!(snapshot.discarded_count, 1);
        assert_eq!(snapshot.peak_level, 1_200.0);
        assert_eq!(snapshot.recent_reads.len(), 3);
    }

    #[tokio::test]
    async fn recent_reads_are_bounded() {
        let metrics = MetricsCollector::new();
        for _ in 0..(MAX_RECENT_READS + 5) {
            metrics.record_read(read(Some(10.0))).await;
        }
        let snapshot = metrics.get_snapshot().await;
        assert_eq!(snapshot.recent_reads.len(), MAX_RECENT_READS);

        metrics.reset().await;
        assert_eq!(metrics.get_snapshot().await.sample_count, 0);
    }
}
