/// `"1h 2m 3s"`, `"2m 3s"` or `"3s"`. Sub-second remainders are dropped.
pub fn format_duration_ms(duration_ms: u64) -> String {
    let total_secs = duration_ms / 1_000;
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

pub fn talk_listen_label(talk_ratio: f64) -> String {
    let talk = talk_ratio.clamp(0.0, 100.0);
    format!("{:.1}% talk / {:.1}% listen", talk, 100.0 - talk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_use_the_largest_needed_unit() {
        assert_eq!(format_duration_ms(3_723_000), "1h 2m 3s");
        assert_eq!(format_duration_ms(123_456), "2m 3s");
        assert_eq!(format_duration_ms(3_999), "3s");
        assert_eq!(format_duration_ms(0), "0s");
        assert_eq!(format_duration_ms(3_600_000), "1h 0m 0s");
    }

    #[test]
    fn ratio_label() {
        assert_eq!(talk_listen_label(40.0), "40.0% talk / 60.0% listen");
        assert_eq!(talk_listen_label(120.0), "100.0% talk / 0.0% listen");
    }
}
