use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{format_timestamp, parse_datetime},
    models::CalibrationProfile,
};

fn row_to_profile(row: &Row) -> Result<CalibrationProfile> {
    let captured_at: String = row.get("captured_at")?;
    let qualifying: i64 = row.get("qualifying_samples")?;
    let skipped: i64 = row.get("skipped")?;

    Ok(CalibrationProfile {
        noise_floor: row.get("noise_floor")?,
        speaking_threshold: row.get("speaking_threshold")?,
        average_speaking_level: row.get("average_speaking_level")?,
        qualifying_samples: u32::try_from(qualifying).unwrap_or(0),
        skipped: skipped != 0,
        captured_at: parse_datetime(&captured_at, "captured_at")?,
    })
}

impl Database {
    pub async fn get_calibration_profile(&self) -> Result<Option<CalibrationProfile>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT noise_floor, speaking_threshold, average_speaking_level,
                        qualifying_samples, skipped, captured_at
                 FROM calibration_profile
                 WHERE id = 1",
            )?;
            let profile = stmt
                .query_row([], |row| Ok(row_to_profile(row)))
                .optional()?
                .transpose()?;
            Ok(profile)
        })
        .await
    }

    /// Replaces the stored profile wholesale.
    pub async fn save_calibration_profile(&self, profile: &CalibrationProfile) -> Result<()> {
        let profile = profile.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO calibration_profile
                     (id, noise_floor, speaking_threshold, average_speaking_level,
                      qualifying_samples, skipped, captured_at)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    profile.noise_floor,
                    profile.speaking_threshold,
                    profile.average_speaking_level,
                    i64::from(profile.qualifying_samples),
                    profile.skipped as i64,
                    format_timestamp(&profile.captured_at),
                ],
            )?;
            Ok(())
        })
        .await
    }
}
