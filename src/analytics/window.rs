use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::db::PeriodKey;

pub const WEEK_DAYS: u64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeWindow {
    Day,
    /// Seven days ending at (and including) the anchor.
    Week,
    Month,
    Year,
    AllTime,
}

impl TimeWindow {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" | "today" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            "all" | "all-time" | "alltime" => Some(Self::AllTime),
            _ => None,
        }
    }

    /// Human-readable key identifying the bucket for `anchor`.
    pub fn period_label(self, anchor: NaiveDate) -> String {
        match self {
            Self::Day => day_key(anchor),
            Self::Week => {
                let days = week_days(anchor);
                format!("{}..{}", day_key(days[0]), day_key(anchor))
            }
            Self::Month => anchor.format("%Y-%m").to_string(),
            Self::Year => anchor.format("%Y").to_string(),
            Self::AllTime => "all".to_string(),
        }
    }

    /// Store key for windows answered by a single keyed query. Week and
    /// all-time have none.
    pub fn period_key(self, anchor: NaiveDate) -> Option<PeriodKey> {
        match self {
            Self::Day => Some(PeriodKey::Date(day_key(anchor))),
            Self::Month => Some(PeriodKey::Month(anchor.format("%Y-%m").to_string())),
            Self::Year => Some(PeriodKey::Year(anchor.format("%Y").to_string())),
            Self::Week | Self::AllTime => None,
        }
    }
}

pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// The seven days ending at `anchor`, oldest first.
pub fn week_days(anchor: NaiveDate) -> Vec<NaiveDate> {
    (0..WEEK_DAYS)
        .rev()
        .map(|back| anchor.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN))
        .collect()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_spans_seven_days_ending_at_anchor() {
        let days = week_days(date(2025, 3, 2));
        assert_eq!(days.len(), 7);
        assert_eq!(days[0], date(2025, 2, 24));
        assert_eq!(days[6], date(2025, 3, 2));
    }

    #[test]
    fn keys_match_record_formats() {
        let anchor = date(2025, 1, 9);
        assert_eq!(
            TimeWindow::Day.period_key(anchor),
            Some(PeriodKey::Date("2025-01-09".into()))
        );
        assert_eq!(
            TimeWindow::Month.period_key(anchor),
            Some(PeriodKey::Month("2025-01".into()))
        );
        assert_eq!(TimeWindow::Week.period_key(anchor), None);
        assert_eq!(TimeWindow::Week.period_label(anchor), "2025-01-03..2025-01-09");
    }

    #[test]
    fn parses_window_names() {
        assert_eq!(TimeWindow::parse("Week"), Some(TimeWindow::Week));
        assert_eq!(TimeWindow::parse("all"), Some(TimeWindow::AllTime));
        assert_eq!(TimeWindow::parse("fortnight"), None);
    }
}
