use std::{convert::TryFrom, future::Future};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use log::warn;

use crate::error::PersistenceFailure;

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

/// Fixed-width UTC timestamps so that `ORDER BY` / `MAX()` on the text column
/// agree with chronological order.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

/// Runs a store write, retrying exactly once. The second failure is returned
/// as a [`PersistenceFailure`] so callers can surface it and move on.
pub async fn persist_with_retry<F, Fut>(what: &'static str, mut write: F) -> Result<(), PersistenceFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    match write().await {
        Ok(()) => Ok(()),
        Err(first) => {
            warn!("{what} write failed, retrying once: {first:#}");
            write().await.map_err(|source| PersistenceFailure {
                what,
                attempts: 2,
                source,
            })
        }
    }
}
