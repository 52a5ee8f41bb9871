use serde::{Deserialize, Serialize};

/// A phone number enrolled for automatic tracking. `phone_number` is always
/// stored in normalized form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackedNumber {
    pub phone_number: String,
    pub label: String,
    pub source_id: Option<String>,
}
