use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection};

use super::{format_date, parse_date, parse_enum, parse_uuid, placeholders};
use crate::db::DatabaseError;
use crate::models::{EventFilter, RawEventRecord, Subject};

/// Insert one raw event record.
pub fn insert_event(conn: &Connection, event: &RawEventRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO service_events (id, subject_kind, subject_id, division_id, event_date, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.id.to_string(),
            event.subject.kind.as_str(),
            event.subject.id,
            event.division_id,
            format_date(event.event_date),
            event.status.as_str(),
        ],
    )?;
    Ok(())
}

/// Builds the shared WHERE clause and its bound values.
/// An empty state allow-list matches nothing, so callers check it first.
fn event_where_clause(filter: &EventFilter) -> (String, Vec<String>) {
    let mut values = vec![
        filter.subject.kind.as_str().to_string(),
        filter.subject.id.clone(),
        format_date(filter.range.start),
        format_date(filter.range.end),
    ];
    let mut clause = String::from(
        "subject_kind = ?1 AND subject_id = ?2 AND event_date >= ?3 AND event_date <= ?4",
    );
    if let Some(ref division) = filter.division_id {
        values.push(division.clone());
        clause.push_str(&format!(" AND division_id = ?{}", values.len()));
    }
    let first_state = values.len() + 1;
    values.extend(filter.allowed_states.iter().map(|s| s.as_str().to_string()));
    clause.push_str(&format!(
        " AND status IN ({})",
        placeholders(first_state, filter.allowed_states.len())
    ));
    (clause, values)
}

/// List qualifying raw events, oldest first.
pub fn list_events(
    conn: &Connection,
    filter: &EventFilter,
) -> Result<Vec<RawEventRecord>, DatabaseError> {
    if filter.allowed_states.is_empty() {
        return Ok(Vec::new());
    }
    let (clause, values) = event_where_clause(filter);
    let sql = format!(
        "SELECT id, subject_kind, subject_id, division_id, event_date, status
         FROM service_events WHERE {clause}
         ORDER BY event_date, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            let id: String = row.get(0)?;
            let kind: String = row.get(1)?;
            let date: String = row.get(4)?;
            let status: String = row.get(5)?;
            Ok(RawEventRecord {
                id: parse_uuid(0, &id)?,
                subject: Subject {
                    kind: parse_enum(1, &kind)?,
                    id: row.get(2)?,
                },
                division_id: row.get(3)?,
                event_date: parse_date(4, &date)?,
                status: parse_enum(5, &status)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Per-date tallies of qualifying events, computed by SQLite.
pub fn count_events_by_date(
    conn: &Connection,
    filter: &EventFilter,
) -> Result<Vec<(NaiveDate, u64)>, DatabaseError> {
    if filter.allowed_states.is_empty() {
        return Ok(Vec::new());
    }
    let (clause, values) = event_where_clause(filter);
    let sql = format!(
        "SELECT event_date, COUNT(*) FROM service_events WHERE {clause}
         GROUP BY event_date ORDER BY event_date"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            let date: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((parse_date(0, &date)?, count.max(0) as u64))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
