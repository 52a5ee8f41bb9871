use anyhow::{bail, Result};
use chrono::Utc;
use rusqlite::{params, Row};

use crate::{
    db::{connection::Database, helpers::format_timestamp, models::TrackedNumber},
    eligibility::normalize_number,
};

fn row_to_tracked(row: &Row) -> Result<TrackedNumber> {
    Ok(TrackedNumber {
        phone_number: row.get("phone_number")?,
        label: row.get("label")?,
        source_id: row.get("source_id")?,
    })
}

impl Database {
    /// Enrolls `phone_number` (normalized before storage) or relabels it.
    pub async fn upsert_tracked_number(
        &self,
        phone_number: &str,
        label: &str,
        source_id: Option<String>,
    ) -> Result<TrackedNumber> {
        let normalized = normalize_number(phone_number);
        if normalized.is_empty() {
            bail!("phone number is empty after normalization");
        }
        let label = label.trim().to_string();
        if label.is_empty() {
            bail!("tracked number label must not be empty");
        }

        let tracked = TrackedNumber {
            phone_number: normalized,
            label,
            source_id,
        };
        let record = tracked.clone();
        self.execute(move |conn| {
            let now = format_timestamp(&Utc::now());
            conn.execute(
                "INSERT INTO tracked_numbers (phone_number, label, source_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(phone_number) DO UPDATE SET
                     label = excluded.label,
                     source_id = excluded.source_id,
                     updated_at = excluded.updated_at",
                params![record.phone_number, record.label, record.source_id, now],
            )?;
            Ok(())
        })
        .await?;

        Ok(tracked)
    }

    /// Returns whether the number was enrolled.
    pub async fn remove_tracked_number(&self, phone_number: &str) -> Result<bool> {
        let normalized = normalize_number(phone_number);
        self.execute(move |conn| {
            let rows = conn.execute(
                "DELETE FROM tracked_numbers WHERE phone_number = ?1",
                params![normalized],
            )?;
            Ok(rows > 0)
        })
        .await
    }

    pub async fn list_tracked_numbers(&self) -> Result<Vec<TrackedNumber>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT phone_number, label, source_id
                 FROM tracked_numbers
                 ORDER BY label ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut numbers = Vec::new();
            while let Some(row) = rows.next()? {
                numbers.push(row_to_tracked(row)?);
            }
            Ok(numbers)
        })
        .await
    }
}
