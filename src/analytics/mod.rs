//! Time-bucketed statistics over stored call records.

pub mod aggregator;
pub mod format;
pub mod style;
pub mod window;

pub use aggregator::{
    rank_records, AnalyticsAggregator, AnalyticsBucket, BucketScope, ContactRanking, RankOrder,
};
pub use format::{format_duration_ms, talk_listen_label};
pub use style::{contextual_advice, evaluate_style, style_range, AdviceContext, StyleAssessment, StyleCategory};
pub use window::{week_days, TimeWindow};
