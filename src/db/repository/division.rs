use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::Division;

/// Insert or rename a division.
pub fn upsert_division(conn: &Connection, division: &Division) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO divisions (id, name) VALUES (?1, ?2)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        params![division.id, division.name],
    )?;
    Ok(())
}

/// All known divisions, ordered by name.
pub fn list_divisions(conn: &Connection) -> Result<Vec<Division>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, name FROM divisions ORDER BY name, id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Division {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
