use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadMetrics {
    pub timestamp: DateTime<Utc>,
    pub read_ms: u64,
    /// `None` when the source could not produce a level.
    pub level: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub system: SystemMetrics,
    pub recent_reads: Vec<ReadMetrics>,
    pub sample_count: u64,
    pub unavailable_count: u64,
    pub discarded_count: u64,
    pub peak_level: f64,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            system: SystemMetrics {
                cpu_percent: 0.0,
                memory_mb: 0.0,
            },
            recent_reads: Vec::new(),
            sample_count: 0,
            unavailable_count: 0,
            discarded_count: 0,
            peak_level: 0.0,
        }
    }
}
