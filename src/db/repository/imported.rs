use rusqlite::{params, params_from_iter, Connection};
use uuid::Uuid;

use super::{format_date, format_datetime, parse_date, parse_datetime, parse_enum, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{ImportFilter, ImportedAggregateRecord, Subject};

/// Insert a batch of imported tallies atomically. Returns the inserted count.
pub fn insert_imported_records(
    conn: &Connection,
    records: &[ImportedAggregateRecord],
) -> Result<usize, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO imported_aggregates
             (id, subject_kind, subject_id, division_id, record_date, count, provenance, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for record in records {
            stmt.execute(params![
                record.id.to_string(),
                record.subject.kind.as_str(),
                record.subject.id,
                record.division_id,
                format_date(record.record_date),
                record.count as i64,
                record.provenance,
                record.note,
                format_datetime(record.created_at),
            ])?;
        }
    }
    tx.commit()?;
    Ok(records.len())
}

/// List imported tallies for a subject within a window, oldest first.
///
/// A system-wide filter (`division_id = None`) includes rows from every
/// division as well as rows recorded without one.
pub fn list_imports(
    conn: &Connection,
    filter: &ImportFilter,
) -> Result<Vec<ImportedAggregateRecord>, DatabaseError> {
    let mut values = vec![
        filter.subject.kind.as_str().to_string(),
        filter.subject.id.clone(),
        format_date(filter.range.start),
        format_date(filter.range.end),
    ];
    let mut sql = String::from(
        "SELECT id, subject_kind, subject_id, division_id, record_date, count, provenance, note, created_at
         FROM imported_aggregates
         WHERE subject_kind = ?1 AND subject_id = ?2 AND record_date >= ?3 AND record_date <= ?4",
    );
    if let Some(ref division) = filter.division_id {
        values.push(division.clone());
        sql.push_str(" AND division_id = ?5");
    }
    sql.push_str(" ORDER BY record_date, id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            let id: String = row.get(0)?;
            let kind: String = row.get(1)?;
            let date: String = row.get(4)?;
            let count: i64 = row.get(5)?;
            let created: String = row.get(8)?;
            Ok(ImportedAggregateRecord {
                id: parse_uuid(0, &id)?,
                subject: Subject {
                    kind: parse_enum(1, &kind)?,
                    id: row.get(2)?,
                },
                division_id: row.get(3)?,
                record_date: parse_date(4, &date)?,
                count: count.clamp(0, u32::MAX as i64) as u32,
                provenance: row.get(6)?,
                note: row.get(7)?,
                created_at: parse_datetime(8, &created)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Delete one imported tally. Returns whether a row was removed.
pub fn delete_imported_record(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM imported_aggregates WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(deleted > 0)
}
