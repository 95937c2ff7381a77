//! Persisted forecast batches and their points.
//!
//! Points are unique per (subject, division, granularity, date). A replace
//! deletes the key's points inside the new batch's span, drops batches left
//! without points, and inserts the new batch, all in one transaction.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use super::{format_date, format_datetime, parse_date, parse_datetime, parse_enum, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{
    DateRange, ForecastKey, ForecastPoint, ModelAccuracy, PersistedForecastBatch,
};

const KEY_CLAUSE: &str =
    "subject_kind = ?1 AND subject_id = ?2 AND division_key = ?3 AND granularity = ?4";

fn key_params(key: &ForecastKey) -> [String; 4] {
    [
        key.subject.kind.as_str().to_string(),
        key.subject.id.clone(),
        key.division_key().to_string(),
        key.granularity.as_str().to_string(),
    ]
}

fn delete_points_in_range(
    conn: &Connection,
    key: &ForecastKey,
    range: &DateRange,
) -> Result<usize, DatabaseError> {
    let [kind, subject, division, granularity] = key_params(key);
    let deleted = conn.execute(
        &format!("DELETE FROM forecast_points WHERE {KEY_CLAUSE} AND forecast_date >= ?5 AND forecast_date <= ?6"),
        params![kind, subject, division, granularity, format_date(range.start), format_date(range.end)],
    )?;
    Ok(deleted)
}

fn delete_empty_batches(conn: &Connection, key: &ForecastKey) -> Result<usize, DatabaseError> {
    let [kind, subject, division, granularity] = key_params(key);
    let deleted = conn.execute(
        &format!(
            "DELETE FROM forecast_batches WHERE {KEY_CLAUSE}
             AND NOT EXISTS (SELECT 1 FROM forecast_points p WHERE p.batch_id = forecast_batches.id)"
        ),
        params![kind, subject, division, granularity],
    )?;
    Ok(deleted)
}

/// Replace every stored point for the batch's key inside its date span with
/// the batch's points. Returns the number of points inserted.
pub fn replace_forecast_batch(
    conn: &Connection,
    batch: &PersistedForecastBatch,
) -> Result<usize, DatabaseError> {
    if let Some(outside) = batch.points.iter().find(|p| !batch.date_range.contains(p.date)) {
        return Err(DatabaseError::ConstraintViolation(format!(
            "forecast point {} lies outside batch range {}..{}",
            outside.date, batch.date_range.start, batch.date_range.end
        )));
    }

    let tx = conn.unchecked_transaction()?;

    let removed = delete_points_in_range(&tx, &batch.key, &batch.date_range)?;
    let orphaned = delete_empty_batches(&tx, &batch.key)?;

    let [kind, subject, division, granularity] = key_params(&batch.key);
    tx.execute(
        "INSERT INTO forecast_batches
         (id, subject_kind, subject_id, division_key, granularity, date_from, date_to, model_version,
          mse, rmse, mae, r_squared, confidence_level, interpretation,
          data_quality, seasonality_detected, historical_point_count, generated_by, generated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        params![
            batch.id.to_string(),
            kind,
            subject,
            division,
            granularity,
            format_date(batch.date_range.start),
            format_date(batch.date_range.end),
            batch.model_version,
            batch.accuracy.mse,
            batch.accuracy.rmse,
            batch.accuracy.mae,
            batch.accuracy.r_squared,
            batch.accuracy.confidence_level,
            batch.accuracy.interpretation.as_str(),
            batch.data_quality.as_str(),
            batch.seasonality_detected as i32,
            batch.historical_point_count as i64,
            batch.generated_by,
            format_datetime(batch.generated_at),
        ],
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO forecast_points
             (batch_id, subject_kind, subject_id, division_key, granularity,
              forecast_date, predicted_value, lower_bound, upper_bound)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for point in &batch.points {
            stmt.execute(params![
                batch.id.to_string(),
                kind,
                subject,
                division,
                granularity,
                format_date(point.date),
                point.predicted_value,
                point.lower_bound,
                point.upper_bound,
            ])?;
        }
    }

    tx.commit()?;

    tracing::debug!(
        key = %batch.key.subject,
        granularity = %batch.key.granularity,
        removed,
        orphaned,
        inserted = batch.points.len(),
        "Replaced forecast points"
    );
    Ok(batch.points.len())
}

/// Delete stored points (and batches left empty) for a key within a range.
/// Returns the number of points removed.
pub fn delete_forecast_range(
    conn: &Connection,
    key: &ForecastKey,
    range: &DateRange,
) -> Result<usize, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let removed = delete_points_in_range(&tx, key, range)?;
    delete_empty_batches(&tx, key)?;
    tx.commit()?;
    Ok(removed)
}

/// Count stored points for a key within a range.
pub fn count_forecast_points(
    conn: &Connection,
    key: &ForecastKey,
    range: &DateRange,
) -> Result<usize, DatabaseError> {
    let [kind, subject, division, granularity] = key_params(key);
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM forecast_points WHERE {KEY_CLAUSE} AND forecast_date >= ?5 AND forecast_date <= ?6"),
        params![kind, subject, division, granularity, format_date(range.start), format_date(range.end)],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Batch-level columns, without points.
struct BatchRow {
    id: String,
    date_from: String,
    date_to: String,
    model_version: String,
    accuracy: ModelAccuracy,
    data_quality: String,
    seasonality_detected: bool,
    historical_point_count: i64,
    generated_by: String,
    generated_at: String,
}

fn fetch_batch_row(conn: &Connection, batch_id: &str) -> Result<Option<BatchRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, date_from, date_to, model_version, mse, rmse, mae, r_squared,
                    confidence_level, interpretation, data_quality, seasonality_detected,
                    historical_point_count, generated_by, generated_at
             FROM forecast_batches WHERE id = ?1",
            params![batch_id],
            |row| {
                let interpretation: String = row.get(9)?;
                Ok(BatchRow {
                    id: row.get(0)?,
                    date_from: row.get(1)?,
                    date_to: row.get(2)?,
                    model_version: row.get(3)?,
                    accuracy: ModelAccuracy {
                        mse: row.get(4)?,
                        rmse: row.get(5)?,
                        mae: row.get(6)?,
                        r_squared: row.get(7)?,
                        confidence_level: row.get(8)?,
                        interpretation: parse_enum(9, &interpretation)?,
                    },
                    data_quality: row.get(10)?,
                    seasonality_detected: row.get::<_, i32>(11)? != 0,
                    historical_point_count: row.get(12)?,
                    generated_by: row.get(13)?,
                    generated_at: row.get(14)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Stored points for a key overlapping `range`, returned as one batch.
///
/// Points may come from several stored batches when an older batch still
/// covers dates a newer one did not. Batch-level metadata (accuracy,
/// quality, generation time) is taken from the most recently generated
/// contributing batch; `date_range` is the span of the returned points.
pub fn query_forecast(
    conn: &Connection,
    key: &ForecastKey,
    range: &DateRange,
) -> Result<Option<PersistedForecastBatch>, DatabaseError> {
    let [kind, subject, division, granularity] = key_params(key);
    let mut stmt = conn.prepare(&format!(
        "SELECT batch_id, forecast_date, predicted_value, lower_bound, upper_bound
         FROM forecast_points
         WHERE {KEY_CLAUSE} AND forecast_date >= ?5 AND forecast_date <= ?6
         ORDER BY forecast_date"
    ))?;
    let rows = stmt
        .query_map(
            params![kind, subject, division, granularity, format_date(range.start), format_date(range.end)],
            |row| {
                let date: String = row.get(1)?;
                Ok((
                    row.get::<_, String>(0)?,
                    ForecastPoint {
                        date: parse_date(1, &date)?,
                        predicted_value: row.get(2)?,
                        lower_bound: row.get(3)?,
                        upper_bound: row.get(4)?,
                    },
                ))
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return Ok(None);
    };
    let date_range = DateRange { start: first.1.date, end: last.1.date };

    let mut batches: HashMap<&str, BatchRow> = HashMap::new();
    for (batch_id, _) in &rows {
        if !batches.contains_key(batch_id.as_str()) {
            let row = fetch_batch_row(conn, batch_id)?.ok_or_else(|| DatabaseError::NotFound {
                entity_type: "forecast_batch".into(),
                id: batch_id.clone(),
            })?;
            batches.insert(batch_id.as_str(), row);
        }
    }
    let newest = batches
        .into_values()
        .max_by(|a, b| (&a.generated_at, &a.id).cmp(&(&b.generated_at, &b.id)))
        .ok_or_else(|| DatabaseError::NotFound {
            entity_type: "forecast_batch".into(),
            id: "<none>".into(),
        })?;

    tracing::trace!(
        stored_from = %newest.date_from,
        stored_to = %newest.date_to,
        "Newest contributing forecast batch"
    );

    Ok(Some(PersistedForecastBatch {
        id: parse_uuid(0, &newest.id)?,
        key: key.clone(),
        date_range,
        model_version: newest.model_version,
        points: rows.into_iter().map(|(_, point)| point).collect(),
        accuracy: newest.accuracy,
        data_quality: parse_enum(10, &newest.data_quality)?,
        seasonality_detected: newest.seasonality_detected,
        historical_point_count: newest.historical_point_count.max(0) as usize,
        generated_by: newest.generated_by,
        generated_at: parse_datetime(14, &newest.generated_at)?,
    }))
}
