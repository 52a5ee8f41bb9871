use serde::Serialize;

use crate::settings::CompletenessSettings;

/// When measured speaking/listening time is trusted as-is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletenessPolicy {
    /// Measured time below this share of the call duration is incomplete.
    pub min_tracked_ratio: f64,
    /// Speaking share applied to the whole call when nothing usable was
    /// measured.
    pub fallback_speaking_ratio: f64,
}

impl Default for CompletenessPolicy {
    fn default() -> Self {
        Self::from(&CompletenessSettings::default())
    }
}

impl From<&CompletenessSettings> for CompletenessPolicy {
    fn from(settings: &CompletenessSettings) -> Self {
        Self {
            min_tracked_ratio: settings.min_tracked_ratio,
            fallback_speaking_ratio: settings.fallback_speaking_ratio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Adjustment {
    None,
    /// The untracked remainder was shared out in the measured proportion.
    Proportional,
    /// Measurements were unusable; the fixed split was applied.
    FixedSplit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalTimes {
    pub speaking_ms: u64,
    pub listening_ms: u64,
    pub adjustment: Adjustment,
}

pub fn finalize_times(
    speaking_ms: u64,
    listening_ms: u64,
    total_ms: u64,
    policy: &CompletenessPolicy,
) -> FinalTimes {
    let tracked = speaking_ms.saturating_add(listening_ms);
    let incomplete = (tracked as f64) < policy.min_tracked_ratio * total_ms as f64;

    if !incomplete && speaking_ms > 0 {
        return FinalTimes {
            speaking_ms,
            listening_ms,
            adjustment: Adjustment::None,
        };
    }

    if speaking_ms > 0 && listening_ms > 0 {
        let shortfall = total_ms.saturating_sub(tracked);
        let speaking_share =
            ((shortfall as f64) * (speaking_ms as f64) / (tracked as f64)).round() as u64;
        let speaking_share = speaking_share.min(shortfall);
        return FinalTimes {
            speaking_ms: speaking_ms + speaking_share,
            listening_ms: listening_ms + (shortfall - speaking_share),
            adjustment: Adjustment::Proportional,
        };
    }

    let speaking = ((total_ms as f64) * policy.fallback_speaking_ratio).round() as u64;
    let speaking = speaking.min(total_ms);
    FinalTimes {
        speaking_ms: speaking,
        listening_ms: total_ms - speaking,
        adjustment: Adjustment::FixedSplit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CompletenessPolicy {
        CompletenessPolicy::default()
    }

    #[test]
    fn nothing_measured_uses_forty_sixty_split() {
        let times = finalize_times(0, 0, 10_000, &policy());
        assert_eq!(times.speaking_ms, 4_000);
        assert_eq!(times.listening_ms, 6_000);
        assert_eq!(times.adjustment, Adjustment::FixedSplit);
    }

    #[test]
    fn shortfall_is_shared_in_measured_proportion() {
        let times = finalize_times(1_000, 3_000, 10_000, &policy());
        assert_eq!(times.adjustment, Adjustment::Proportional);
        assert_eq!(times.speaking_ms, 2_500);
        assert_eq!(times.listening_ms, 7_500);
    }

    #[test]
    fn complete_measurements_are_kept() {
        let times = finalize_times(3_000, 5_500, 10_000, &policy());
        assert_eq!(
            times,
            FinalTimes {
                speaking_ms: 3_000,
                listening_ms: 5_500,
                adjustment: Adjustment::None,
            }
        );
    }

    #[test]
    fn silent_user_gets_fixed_split_even_when_complete() {
        let times = finalize_times(0, 9_500, 10_000, &policy());
        assert_eq!(times.adjustment, Adjustment::FixedSplit);
        assert_eq!(times.speaking_ms, 4_000);
    }

    #[test]
    fn one_sided_incomplete_measurement_uses_fixed_split() {
        let times = finalize_times(2_000, 0, 10_000, &policy());
        assert_eq!(times.adjustment, Adjustment::FixedSplit);
        assert_eq!((times.speaking_ms, times.listening_ms), (4_000, 6_000));
    }

    #[test]
    fn adjusted_totals_match_call_duration() {
        for (s, l, total) in [(1, 2, 9_999), (700, 100, 10_001), (33, 77, 12_345)] {
            let times = finalize_times(s, l, total, &policy());
            assert_eq!(times.speaking_ms + times.listening_ms, total);
        }
    }

    #[test]
    fn zero_length_call_stays_zero() {
        let times = finalize_times(0, 0, 0, &policy());
        assert_eq!((times.speaking_ms, times.listening_ms), (0, 0));
    }
}
