//! Connection setup and schema migrations.
//!
//! Migrations are numbered SQL files under `resources/migrations/`, applied
//! in order on every open. Each file records its own number in
//! `schema_version`, so reopening an up-to-date database is a no-op.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use super::DatabaseError;

/// Ordered schema steps. Append only; never edit a released step.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../resources/migrations/001_initial.sql"))];

/// Settings applied to every connection before migrating.
const CONNECTION_PRAGMAS: &str = "PRAGMA journal_mode=DELETE;
     PRAGMA foreign_keys=ON;
     PRAGMA busy_timeout=5000;";

/// Open (creating if needed) the forecast database at `path`, migrated to
/// the latest schema. Missing parent directories are created.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = parent {
        std::fs::create_dir_all(dir).map_err(|e| {
            DatabaseError::ConstraintViolation(format!(
                "cannot create database directory {}: {e}",
                dir.display()
            ))
        })?;
    }
    prepare(Connection::open(path)?)
}

/// Private in-memory database with the full schema. Gone when dropped.
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    prepare(Connection::open_in_memory()?)
}

fn prepare(conn: Connection) -> Result<Connection, DatabaseError> {
    conn.execute_batch(CONNECTION_PRAGMAS)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Apply every migration newer than the recorded schema version.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let applied = schema_version(conn)?;
    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > applied) {
        tracing::info!(version, "Applying schema migration");
        conn.execute_batch(sql).map_err(|e| DatabaseError::MigrationFailed {
            version,
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

/// Highest applied migration, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let has_table = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !has_table {
        return Ok(0);
    }
    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

/// Number of user tables (SQLite internals excluded).
pub fn count_tables(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_has_forecast_schema() {
        let conn = open_memory_database().unwrap();
        assert_eq!(count_tables(&conn).unwrap(), 6);
        assert_eq!(schema_version(&conn).unwrap(), MIGRATIONS.len() as i64);
    }

    #[test]
    fn unmigrated_connection_reports_version_zero() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn reapplying_migrations_changes_nothing() {
        let conn = open_memory_database().unwrap();
        run_migrations(&conn).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn orphan_import_rejected_by_foreign_key() {
        let conn = open_memory_database().unwrap();
        let result = conn.execute(
            "INSERT INTO imported_aggregates
             (id, subject_kind, subject_id, division_id, record_date, count, provenance, created_at)
             VALUES ('x', 'service', 'prenatal', 'brgy-missing', '2024-01-01', 3, 'ledger', '2024-01-01 00:00:00')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn reopening_file_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("forecast.db");
        {
            let conn = open_database(&path).unwrap();
            conn.execute("INSERT INTO divisions (id, name) VALUES ('brgy-01', 'Poblacion')", [])
                .unwrap();
        }
        let conn = open_database(&path).unwrap();
        let names: i64 = conn
            .query_row("SELECT COUNT(*) FROM divisions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(names, 1);
        assert_eq!(schema_version(&conn).unwrap(), 1);
    }
}
