use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Row};

use crate::db::{
    connection::Database,
    helpers::{format_timestamp, parse_datetime, to_i64, to_u64},
    models::{CallRecord, ContactCallCount},
};

const RECORD_COLUMNS: &str = "id, label, phone_number, speaking_ms, listening_ms, total_duration_ms, \
     talk_ratio, started_at, call_date, call_month, call_year";

fn row_to_record(row: &Row) -> Result<CallRecord> {
    let started_at: String = row.get("started_at")?;
    let speaking_ms: i64 = row.get("speaking_ms")?;
    let listening_ms: i64 = row.get("listening_ms")?;
    let total_duration_ms: i64 = row.get("total_duration_ms")?;

    Ok(CallRecord {
        id: row.get("id")?,
        label: row.get("label")?,
        phone_number: row.get("phone_number")?,
        speaking_time_ms: to_u64(speaking_ms, "speaking_ms")?,
        listening_time_ms: to_u64(listening_ms, "listening_ms")?,
        total_duration_ms: to_u64(total_duration_ms, "total_duration_ms")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        call_date: row.get("call_date")?,
        call_month: row.get("call_month")?,
        call_year: row.get("call_year")?,
        talk_ratio: row.get("talk_ratio")?,
    })
}

/// Period column a record query is keyed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodKey {
    Date(String),
    Month(String),
    Year(String),
}

impl PeriodKey {
    fn column(&self) -> &'static str {
        match self {
            PeriodKey::Date(_) => "call_date",
            PeriodKey::Month(_) => "call_month",
            PeriodKey::Year(_) => "call_year",
        }
    }

    fn value(&self) -> &str {
        match self {
            PeriodKey::Date(v) | PeriodKey::Month(v) | PeriodKey::Year(v) => v,
        }
    }
}

/// Filter for [`Database::list_call_records`]. Empty means every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub contact: Option<String>,
    pub period: Option<PeriodKey>,
}

impl RecordQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contact(label: impl Into<String>) -> Self {
        Self {
            contact: Some(label.into()),
            period: None,
        }
    }

    pub fn with_contact(mut self, contact: Option<String>) -> Self {
        self.contact = contact;
        self
    }

    pub fn with_period(mut self, period: PeriodKey) -> Self {
        self.period = Some(period);
        self
    }
}

impl Database {
    pub async fn insert_call_record(&self, record: &CallRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO call_records (id, label, phone_number, speaking_ms, listening_ms, total_duration_ms,
                                           talk_ratio, started_at, call_date, call_month, call_year, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    record.id,
                    record.label,
                    record.phone_number,
                    to_i64(record.speaking_time_ms)?,
                    to_i64(record.listening_time_ms)?,
                    to_i64(record.total_duration_ms)?,
                    record.talk_ratio,
                    format_timestamp(&record.started_at),
                    record.call_date,
                    record.call_month,
                    record.call_year,
                    format_timestamp(&Utc::now()),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Records matching `query`, newest first.
    pub async fn list_call_records(&self, query: &RecordQuery) -> Result<Vec<CallRecord>> {
        let query = query.clone();
        self.execute(move |conn| {
            let mut clauses = Vec::new();
            let mut values: Vec<String> = Vec::new();
            if let Some(contact) = &query.contact {
                values.push(contact.clone());
                clauses.push(format!("label = ?{}", values.len()));
            }
            if let Some(period) = &query.period {
                values.push(period.value().to_string());
                clauses.push(format!("{} = ?{}", period.column(), values.len()));
            }

            let where_clause = if clauses.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", clauses.join(" AND "))
            };
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM call_records {where_clause} ORDER BY started_at DESC"
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(values.iter()))?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            Ok(records)
        })
        .await
    }

    /// Latest call for each contact, newest first.
    pub async fn most_recent_call_per_contact(&self) -> Result<Vec<CallRecord>> {
        self.execute(|conn| {
            let sql = format!(
                "SELECT {RECORD_COLUMNS} FROM call_records c1
                 WHERE started_at = (
                     SELECT MAX(started_at) FROM call_records c2 WHERE c2.label = c1.label
                 )
                 ORDER BY started_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut records: Vec<CallRecord> = Vec::new();
            while let Some(row) = rows.next()? {
                let record = row_to_record(row)?;
                // Two calls sharing the max timestamp: keep the first.
                if records.iter().all(|r| r.label != record.label) {
                    records.push(record);
                }
            }
            Ok(records)
        })
        .await
    }

    pub async fn contact_call_counts(&self) -> Result<Vec<ContactCallCount>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT label, COUNT(*) AS call_count
                 FROM call_records
                 GROUP BY label
                 ORDER BY call_count DESC, label ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut counts = Vec::new();
            while let Some(row) = rows.next()? {
                let count: i64 = row.get("call_count")?;
                counts.push(ContactCallCount {
                    label: row.get("label")?,
                    call_count: to_u64(count, "call_count")?,
                });
            }
            Ok(counts)
        })
        .await
    }

    /// Returns whether a record was removed.
    pub async fn delete_call_record(&self, record_id: &str) -> Result<bool> {
        let record_id = record_id.to_string();
        self.execute(move |conn| {
            let rows = conn.execute("DELETE FROM call_records WHERE id = ?1", params![record_id])?;
            Ok(rows > 0)
        })
        .await
    }

    /// Returns the number of records removed.
    pub async fn delete_call_records_for_contact(&self, label: &str) -> Result<usize> {
        let label = label.to_string();
        self.execute(move |conn| {
            let rows = conn.execute("DELETE FROM call_records WHERE label = ?1", params![label])?;
            Ok(rows)
        })
        .await
    }

    pub async fn delete_all_call_records(&self) -> Result<usize> {
        self.execute(|conn| Ok(conn.execute("DELETE FROM call_records", [])?))
            .await
    }
}
