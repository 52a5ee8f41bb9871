//! Maps incoming phone numbers to tracked contacts.
//!
//! Matching is exact after whitespace removal. Punctuation and country-code
//! variants are *not* canonicalized: `+1-555-0100` and `15550100` do not match
//! `+15550100`.

use std::collections::HashMap;

use anyhow::Result;

use crate::db::{Database, TrackedNumber};

/// Strips whitespace (including non-breaking and other Unicode spaces). Never
/// fails; garbage in produces a best-effort string out.
pub fn normalize_number(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

#[derive(Debug, Clone, Default)]
pub struct EligibilityFilter {
    index: HashMap<String, TrackedNumber>,
}

impl EligibilityFilter {
    pub fn from_tracked<I>(numbers: I) -> Self
    where
        I: IntoIterator<Item = TrackedNumber>,
    {
        let index = numbers
            .into_iter()
            .map(|mut tracked| {
                tracked.phone_number = normalize_number(&tracked.phone_number);
                (tracked.phone_number.clone(), tracked)
            })
            .collect();
        Self { index }
    }

    pub async fn load(db: &Database) -> Result<Self> {
        Ok(Self::from_tracked(db.list_tracked_numbers().await?))
    }

    pub fn lookup(&self, phone_number: &str) -> Option<&TrackedNumber> {
        self.index.get(&normalize_number(phone_number))
    }

    pub fn label_for(&self, phone_number: &str) -> Option<&str> {
        self.lookup(phone_number).map(|tracked| tracked.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
