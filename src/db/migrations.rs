use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Schema steps in order; a step's position + 1 is the `user_version` it
/// brings the store to.
const MIGRATIONS: &[(&str, &str)] = &[
    ("calls and tracked numbers", include_str!("schemas/schema_v1.sql")),
    ("calibration profiles", include_str!("schemas/schema_v2.sql")),
];

fn schema_version() -> i32 {
    MIGRATIONS.len() as i32
}

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let current: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;
    let target = schema_version();

    if current > target {
        bail!("store schema v{current} is newer than this build understands (v{target})");
    }
    if current == target {
        return Ok(());
    }
    let pending = MIGRATIONS
        .iter()
        .enumerate()
        .skip(usize::try_from(current).unwrap_or(0));

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;
    for (index, (name, sql)) in pending {
        tx.execute_batch(sql)
            .with_context(|| format!("schema step v{} ({name}) failed", index + 1))?;
    }
    tx.pragma_update(None, "user_version", target)
        .context("failed to record schema version")?;
    tx.commit().context("failed to commit schema steps")?;

    Ok(())
}
