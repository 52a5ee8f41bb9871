use serde::{Deserialize, Serialize};

/// State reported by the telephony event source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum RawCallState {
    Idle,
    Ringing,
    Offhook,
}

impl RawCallState {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "IDLE" => Some(Self::Idle),
            "RINGING" => Some(Self::Ringing),
            "OFFHOOK" | "OFF_HOOK" => Some(Self::Offhook),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TelephonyEvent {
    pub state: RawCallState,
    pub phone_number: Option<String>,
}

impl TelephonyEvent {
    pub fn new(state: RawCallState, phone_number: Option<&str>) -> Self {
        Self {
            state,
            phone_number: phone_number
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CallState {
    #[default]
    Idle,
    Ringing,
    Active,
}

/// Session boundaries derived from raw telephony transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum LifecycleEvent {
    SessionStarted { phone_number: Option<String> },
    SessionEnded { phone_number: Option<String> },
}

/// Three-state call lifecycle machine. At most one session is open at a
/// time; OFFHOOK while already active (call waiting) is ignored.
#[derive(Debug, Clone, Default)]
pub struct CallLifecycleMonitor {
    state: CallState,
    pending_number: Option<String>,
    active_number: Option<String>,
}

impl CallLifecycleMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn active_number(&self) -> Option<&str> {
        self.active_number.as_deref()
    }

    pub fn pending_number(&self) -> Option<&str> {
        self.pending_number.as_deref()
    }

    pub fn on_event(&mut self, event: TelephonyEvent) -> Option<LifecycleEvent> {
        match event.state {
            RawCallState::Ringing => {
                if self.state == CallState::Active {
                    // A second incoming call while talking; remember it but
                    // leave the open session untouched.
                    self.pending_number = event.phone_number;
                    return None;
                }
                self.state = CallState::Ringing;
                self.pending_number = event.phone_number;
                None
            }
            RawCallState::Offhook => {
                if self.state == CallState::Active {
                    return None;
                }
                let number = event.phone_number.or_else(|| self.pending_number.take());
                self.state = CallState::Active;
                self.active_number = number.clone();
                Some(LifecycleEvent::SessionStarted {
                    phone_number: number,
                })
            }
            RawCallState::Idle => {
                let was_active = self.state == CallState::Active;
                let number = self.active_number.take();
                self.pending_number = None;
                self.state = CallState::Idle;
                was_active.then_some(LifecycleEvent::SessionEnded {
                    phone_number: number,
                })
            }
        }
    }
}
