pub mod state;

pub use state::{CallLifecycleMonitor, CallState, LifecycleEvent, RawCallState, TelephonyEvent};

/// Parses one line of the text telephony feed: `<STATE> [number...]`.
/// Everything after the state word is the number, spaces included.
pub fn parse_event_line(line: &str) -> Option<TelephonyEvent> {
    let line = line.trim();
    let (state, rest) = match line.split_once(char::is_whitespace) {
        Some((state, rest)) => (state, Some(rest)),
        None => (line, None),
    };
    let state = RawCallState::parse(state)?;
    Some(TelephonyEvent::new(state, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_state_and_spaced_number() {
        let event = parse_event_line("RINGING +1 555 0100").unwrap();
        assert_eq!(event.state, RawCallState::Ringing);
        assert_eq!(event.phone_number.as_deref(), Some("+1 555 0100"));
    }

    #[test]
    fn number_is_optional() {
        let event = parse_event_line("offhook").unwrap();
        assert_eq!(event.state, RawCallState::Offhook);
        assert!(event.phone_number.is_none());
    }

    #[test]
    fn unknown_state_is_rejected() {
        assert!(parse_event_line("HOLD +15550100").is_none());
        assert!(parse_event_line("").is_none());
    }
}
