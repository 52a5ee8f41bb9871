use std::collections::BTreeMap;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;

use crate::db::{CallRecord, ContactCallCount, Database, PeriodKey, RecordQuery};

use super::{
    style::{evaluate_style, StyleAssessment},
    window::{day_key, today, week_days, TimeWindow},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "label")]
pub enum BucketScope {
    All,
    Contact(String),
}

impl BucketScope {
    fn from_contact(contact: Option<&str>) -> Self {
        match contact {
            Some(label) => Self::Contact(label.to_string()),
            None => Self::All,
        }
    }
}

/// Statistics for one window, derived on demand from stored records.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsBucket {
    pub scope: BucketScope,
    pub window: TimeWindow,
    pub period_key: String,
    pub total_calls: u64,
    pub sum_speaking_ms: u64,
    pub sum_listening_ms: u64,
    pub sum_duration_ms: u64,
    /// Mean of the per-call talk ratios, not pooled time.
    pub average_talk_ratio: f64,
    pub average_call_duration_ms: u64,
    pub records: Vec<CallRecord>,
}

impl AnalyticsBucket {
    pub fn from_records(
        scope: BucketScope,
        window: TimeWindow,
        period_key: impl Into<String>,
        records: Vec<CallRecord>,
    ) -> Self {
        let total_calls = records.len() as u64;
        let sum_speaking_ms = records.iter().map(|r| r.speaking_time_ms).sum();
        let sum_listening_ms = records.iter().map(|r| r.listening_time_ms).sum();
        let sum_duration_ms: u64 = records.iter().map(|r| r.total_duration_ms).sum();

        let (average_talk_ratio, average_call_duration_ms) = if total_calls == 0 {
            (0.0, 0)
        } else {
            let ratio_sum: f64 = records.iter().map(|r| r.talk_ratio).sum();
            (ratio_sum / total_calls as f64, sum_duration_ms / total_calls)
        };

        Self {
            scope,
            window,
            period_key: period_key.into(),
            total_calls,
            sum_speaking_ms,
            sum_listening_ms,
            sum_duration_ms,
            average_talk_ratio,
            average_call_duration_ms,
            records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_calls == 0
    }

    pub fn style(&self) -> Option<StyleAssessment> {
        (!self.is_empty()).then(|| evaluate_style(self.average_talk_ratio))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankOrder {
    /// Lowest average talk ratio first.
    BestListeners,
    /// Highest average talk ratio first.
    MostTalkative,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRanking {
    pub label: String,
    pub total_calls: u64,
    pub average_talk_ratio: f64,
}

#[derive(Clone)]
pub struct AnalyticsAggregator {
    db: Database,
}

impl AnalyticsAggregator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Buckets records for `window` around `anchor` (today when `None`).
    pub async fn aggregate(
        &self,
        window: TimeWindow,
        anchor: Option<NaiveDate>,
        contact: Option<&str>,
    ) -> Result<AnalyticsBucket> {
        let anchor = anchor.unwrap_or_else(today);
        let scope = BucketScope::from_contact(contact);
        let base = RecordQuery::all().with_contact(contact.map(str::to_string));

        let records = match window {
            TimeWindow::Week => {
                let mut records = Vec::new();
                for day in self.daily_breakdown(Some(anchor), contact).await? {
                    records.extend(day.records);
                }
                records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
                records
            }
            TimeWindow::AllTime => self.db.list_call_records(&base).await?,
            keyed => match keyed.period_key(anchor) {
                Some(key) => self.db.list_call_records(&base.with_period(key)).await?,
                None => Vec::new(),
            },
        };

        Ok(AnalyticsBucket::from_records(
            scope,
            window,
            window.period_label(anchor),
            records,
        ))
    }

    /// One day bucket for each of the seven days ending at `anchor`, oldest
    /// first. Days without calls are present and empty.
    pub async fn daily_breakdown(
        &self,
        anchor: Option<NaiveDate>,
        contact: Option<&str>,
    ) -> Result<Vec<AnalyticsBucket>> {
        let anchor = anchor.unwrap_or_else(today);
        let mut buckets = Vec::with_capacity(7);
        for day in week_days(anchor) {
            let key = day_key(day);
            let query = RecordQuery::all()
                .with_contact(contact.map(str::to_string))
                .with_period(PeriodKey::Date(key.clone()));
            let records = self.db.list_call_records(&query).await?;
            buckets.push(AnalyticsBucket::from_records(
                BucketScope::from_contact(contact),
                TimeWindow::Day,
                key,
                records,
            ));
        }
        Ok(buckets)
    }

    pub async fn most_recent_per_contact(&self) -> Result<Vec<CallRecord>> {
        self.db.most_recent_call_per_contact().await
    }

    pub async fn contact_call_counts(&self) -> Result<Vec<ContactCallCount>> {
        self.db.contact_call_counts().await
    }

    /// Top `n` contacts by all-time average talk ratio.
    pub async fn rank_contacts(&self, n: usize, order: RankOrder) -> Result<Vec<ContactRanking>> {
        let records = self.db.list_call_records(&RecordQuery::all()).await?;
        Ok(rank_records(&records, n, order))
    }
}

pub fn rank_records(records: &[CallRecord], n: usize, order: RankOrder) -> Vec<ContactRanking> {
    let mut per_contact: BTreeMap<&str, (u64, f64)> = BTreeMap::new();
    for record in records {
        let entry = per_contact.entry(record.label.as_str()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += record.talk_ratio;
    }

    let mut rankings: Vec<ContactRanking> = per_contact
        .into_iter()
        .map(|(label, (calls, ratio_sum))| ContactRanking {
            label: label.to_string(),
            total_calls: calls,
            average_talk_ratio: ratio_sum / calls as f64,
        })
        .collect();

    // Stable sort keeps ties in label order.
    rankings.sort_by(|a, b| {
        let ordering = a.average_talk_ratio.total_cmp(&b.average_talk_ratio);
        match order {
            RankOrder::BestListeners => ordering,
            RankOrder::MostTalkative => ordering.reverse(),
        }
    });
    rankings.truncate(n);
    rankings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, Local, TimeZone, Utc};

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn call_on(label: &str, days_before: u64, speaking: u64, listening: u64) -> CallRecord {
        let day = anchor().checked_sub_days(Days::new(days_before)).unwrap();
        let noon = day.and_hms_opt(12, 0, 0).unwrap();
        let started_at = Local
            .from_local_datetime(&noon)
            .single()
            .unwrap()
            .with_timezone(&Utc);
        CallRecord::new(label, "+15550100", speaking, listening, speaking + listening, started_at)
    }

    async fn seeded(records: &[CallRecord]) -> AnalyticsAggregator {
        let db = Database::open_in_memory().unwrap();
        for record in records {
            db.insert_call_record(record).await.unwrap();
        }
        AnalyticsAggregator::new(db)
    }

    #[tokio::test]
    async fn average_talk_ratio_is_mean_of_call_ratios() {
        let aggregator = seeded(&[
            call_on("Alice", 0, 1_000, 0),
            call_on("Alice", 0, 0, 9_000),
        ])
        .await;

        let bucket = aggregator
            .aggregate(TimeWindow::Day, Some(anchor()), None)
            .await
            .unwrap();
        assert_eq!(bucket.total_calls, 2);
        assert!((bucket.average_talk_ratio - 50.0).abs() < 1e-9);
        assert_eq!(bucket.sum_duration_ms, 10_000);
        assert_eq!(bucket.average_call_duration_ms, 5_000);
    }

    #[tokio::test]
    async fn week_is_sum_of_its_seven_days() {
        let aggregator = seeded(&[
            call_on("Alice", 0, 1_000, 1_000),
            call_on("Bob", 2, 3_000, 1_000),
            call_on("Alice", 6, 500, 1_500),
            call_on("Alice", 7, 9_000, 1_000),
            call_on("Bob", 8, 9_000, 1_000),
        ])
        .await;

        let week = aggregator
            .aggregate(TimeWindow::Week, Some(anchor()), None)
            .await
            .unwrap();
        let days = aggregator.daily_breakdown(Some(anchor()), None).await.unwrap();

        assert_eq!(days.len(), 7);
        assert_eq!(week.total_calls, 3);
        assert_eq!(week.total_calls, days.iter().map(|d| d.total_calls).sum::<u64>());
        assert_eq!(
            week.sum_speaking_ms,
            days.iter().map(|d| d.sum_speaking_ms).sum::<u64>()
        );
        assert_eq!(week.sum_duration_ms, 2_000 + 4_000 + 2_000);
        assert_eq!(days[0].total_calls, 1, "day seven of the window counts");
        assert!(days[1].is_empty());
        assert_eq!(week.period_key, "2025-06-09..2025-06-15");
    }

    #[tokio::test]
    async fn contact_filter_and_keyed_windows() {
        let aggregator = seeded(&[
            call_on("Alice", 0, 1_000, 3_000),
            call_on("Bob", 0, 3_000, 1_000),
            call_on("Alice", 20, 2_000, 2_000),
        ])
        .await;

        let alice_month = aggregator
            .aggregate(TimeWindow::Month, Some(anchor()), Some("Alice"))
            .await
            .unwrap();
        assert_eq!(alice_month.scope, BucketScope::Contact("Alice".into()));
        assert_eq!(alice_month.total_calls, 2);

        let all = aggregator
            .aggregate(TimeWindow::AllTime, None, None)
            .await
            .unwrap();
        assert_eq!(all.total_calls, 3);

        let empty_year = aggregator
            .aggregate(TimeWindow::Year, NaiveDate::from_ymd_opt(2020, 1, 1), None)
            .await
            .unwrap();
        assert!(empty_year.is_empty());
        assert_eq!(empty_year.average_talk_ratio, 0.0);
        assert!(empty_year.style().is_none());
    }

    #[tokio::test]
    async fn ranks_by_average_ratio() {
        let aggregator = seeded(&[
            call_on("Alice", 0, 1_000, 3_000),
            call_on("Bob", 1, 3_000, 1_000),
            call_on("Carol", 2, 2_000, 2_000),
            call_on("Carol", 3, 2_000, 2_000),
        ])
        .await;

        let listeners = aggregator
            .rank_contacts(2, RankOrder::BestListeners)
            .await
            .unwrap();
        assert_eq!(
            listeners.iter().map(|r| r.label.as_str()).collect::<Vec<_>>(),
            vec!["Alice", "Carol"]
        );
        assert_eq!(listeners[1].total_calls, 2);

        let talkers = aggregator
            .rank_contacts(1, RankOrder::MostTalkative)
            .await
            .unwrap();
        assert_eq!(talkers[0].label, "Bob");
        assert!((talkers[0].average_talk_ratio - 75.0).abs() < 1e-9);

        let recent = aggregator.most_recent_per_contact().await.unwrap();
        assert_eq!(recent.len(), 3);
        let carol = recent.iter().find(|r| r.label == "Carol").unwrap();
        assert_eq!(carol.call_date, "2025-06-13");
    }
}
