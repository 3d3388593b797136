//! Usage: SQLite schema migrations (user_version + incremental upgrades).

use crate::shared::error::AppResult;
use rusqlite::Connection;

const LATEST_SCHEMA_VERSION: i64 = 1;

pub(super) fn apply_migrations(conn: &mut Connection) -> AppResult<()> {
    let mut user_version = read_user_version(conn)?;

    if !(0..=LATEST_SCHEMA_VERSION).contains(&user_version) {
        return Err(format!(
            "DB_ERROR: unsupported sqlite schema version: user_version={user_version} (expected 0..={LATEST_SCHEMA_VERSION})"
        )
        .into());
    }

    while user_version < LATEST_SCHEMA_VERSION {
        let from_version = user_version;
        match user_version {
            0 => migrate_v0_to_v1(conn)?,
            v => {
                return Err(
                    format!("DB_ERROR: no migration registered for user_version={v}").into(),
                )
            }
        }
        user_version = read_user_version(conn)?;
        tracing::info!(
            from_version = from_version,
            to_version = user_version,
            "sqlite schema migrated"
        );
    }

    Ok(())
}

fn read_user_version(conn: &Connection) -> AppResult<i64> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

fn migrate_v0_to_v1(conn: &mut Connection) -> AppResult<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS kv_store (
  key TEXT PRIMARY KEY NOT NULL,
  value TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);
PRAGMA user_version = 1;
"#,
    )?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_is_migrated_to_latest() {
        let mut conn = Connection::open_in_memory().expect("open");
        apply_migrations(&mut conn).expect("migrate");
        assert_eq!(read_user_version(&conn).expect("version"), LATEST_SCHEMA_VERSION);

        // Re-applying is a no-op.
        apply_migrations(&mut conn).expect("migrate again");
        assert_eq!(read_user_version(&conn).expect("version"), LATEST_SCHEMA_VERSION);
    }

    #[test]
    fn future_schema_version_is_rejected() {
        let mut conn = Connection::open_in_memory().expect("open");
        conn.execute_batch("PRAGMA user_version = 42;")
            .expect("set version");
        let err = apply_migrations(&mut conn).expect_err("must reject");
        assert_eq!(err.code(), "DB_ERROR");
    }
}
