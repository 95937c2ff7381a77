//! Forecast Store: generate, fetch, invalidate and import.
//!
//! Orchestrates one request end to end:
//! 1. Access gate (before any I/O)
//! 2. Request validation and division lookup
//! 3. History merge → engine → accuracy evaluator
//! 4. Persisted batch replace (generate) or cache lookup (fetch)
//!
//! Persistence failures never fail a request. A failed replace comes back as
//! `saved = false` with the error attached; a failed cache read is a miss.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use super::accuracy;
use super::calendar::{bucket_start, range_after, window_ending_at};
use super::engine::{self, EngineSettings, ForecastOutput};
use super::error::ForecastError;
use super::merger::{
    merge_history, EventRecordReader, ImportedRecordReader, MergeRequest, MergedSeries,
    SqliteRecordReader,
};
use super::store::{ForecastStore, SqliteForecastStore};
use super::types::{
    FetchRequest, FetchResponse, GenerateRequest, GenerateResponse, ImportResponse, ImportRow,
    InvalidateRequest,
};
use crate::authorization::{AccessGate, Caller};
use crate::config::ForecastConfig;
use crate::db::{self, DatabaseError};
use crate::division_cache::DivisionCache;
use crate::models::enums::Granularity;
use crate::models::{
    DateRange, ForecastKey, ImportedAggregateRecord, ModelAccuracy, PersistedForecastBatch,
    Subject,
};

/// Request-scoped forecasting service. Holds only borrowed collaborators.
pub struct ForecastService<'a> {
    config: &'a ForecastConfig,
    gate: &'a dyn AccessGate,
    events: &'a dyn EventRecordReader,
    imports: &'a dyn ImportedRecordReader,
    store: &'a dyn ForecastStore,
}

impl<'a> ForecastService<'a> {
    /// SQLite-backed readers and store.
    pub fn new(config: &'a ForecastConfig, gate: &'a dyn AccessGate) -> Self {
        Self {
            config,
            gate,
            events: &SqliteRecordReader,
            imports: &SqliteRecordReader,
            store: &SqliteForecastStore,
        }
    }

    pub fn with_readers(
        mut self,
        events: &'a dyn EventRecordReader,
        imports: &'a dyn ImportedRecordReader,
    ) -> Self {
        self.events = events;
        self.imports = imports;
        self
    }

    pub fn with_store(mut self, store: &'a dyn ForecastStore) -> Self {
        self.store = store;
        self
    }

    fn settings(&self) -> EngineSettings {
        EngineSettings::from(self.config)
    }

    // ── Preconditions ────────────────────────────────────

    fn authorize(&self, caller: &Caller, subject: &Subject) -> Result<(), ForecastError> {
        if self.gate.authorize(caller, subject).allowed {
            Ok(())
        } else {
            Err(ForecastError::Unauthorized {
                caller: caller.id.clone(),
                subject: subject.to_string(),
            })
        }
    }

    fn check_horizon(&self, granularity: Granularity, horizon: u32) -> Result<(), ForecastError> {
        let max = self.config.max_horizon(granularity);
        if horizon == 0 || horizon > max {
            return Err(ForecastError::InvalidRequest(format!(
                "horizon must be between 1 and {max} for {granularity} forecasts, got {horizon}"
            )));
        }
        Ok(())
    }

    fn history_window(
        &self,
        granularity: Granularity,
        periods_back: Option<u32>,
        as_of: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<DateRange, ForecastError> {
        let periods = periods_back.unwrap_or_else(|| self.config.default_lookback(granularity));
        let max = self.config.max_lookback(granularity);
        if periods == 0 || periods > max {
            return Err(ForecastError::InvalidRequest(format!(
                "periods_back must be between 1 and {max} for {granularity} series, got {periods}"
            )));
        }
        let as_of = as_of.unwrap_or_else(|| now.with_timezone(&Local).date_naive());
        Ok(window_ending_at(as_of, periods, granularity))
    }

    /// The cache lock is held for this lookup only.
    fn check_division(
        conn: &Connection,
        divisions: &Mutex<DivisionCache>,
        division_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), ForecastError> {
        let Some(id) = division_id else {
            return Ok(());
        };
        let known = divisions
            .lock()
            .map_err(|_| ForecastError::LockPoisoned)?
            .get(conn, id, now)?;
        match known {
            Some(_) => Ok(()),
            None => Err(ForecastError::UnknownDivision(id.to_string())),
        }
    }

    fn load_history(
        &self,
        conn: &Connection,
        subject: &Subject,
        division_id: Option<&str>,
        range: DateRange,
        granularity: Granularity,
    ) -> Result<MergedSeries, ForecastError> {
        let request = MergeRequest {
            subject: subject.clone(),
            division_id: division_id.map(str::to_string),
            range,
            granularity,
            allowed_states: self.config.countable_states(subject.kind).to_vec(),
        };
        merge_history(conn, self.events, self.imports, &request)
    }

    // ═══════════════════════════════════════════════════════════
    // Generate
    // ═══════════════════════════════════════════════════════════

    /// Always recompute. With `auto_save`, replace the stored points for the
    /// key inside the new forecast's span in one transaction.
    pub fn generate(
        &self,
        conn: &Connection,
        divisions: &Mutex<DivisionCache>,
        caller: &Caller,
        request: &GenerateRequest,
        now: DateTime<Utc>,
    ) -> Result<GenerateResponse, ForecastError> {
        self.authorize(caller, &request.subject)?;
        self.check_horizon(request.granularity, request.horizon)?;
        let window = self.history_window(request.granularity, request.periods_back, request.as_of, now)?;
        Self::check_division(conn, divisions, request.division_id.as_deref(), now)?;

        let merged = self.load_history(
            conn,
            &request.subject,
            request.division_id.as_deref(),
            window,
            request.granularity,
        )?;
        let output = engine::forecast(&merged.points, request.horizon, request.granularity, &self.settings())?;
        let accuracy = accuracy::evaluate(&ForecastOutput::observed(&merged.points), &output.fit.fitted);

        let mut response = GenerateResponse {
            points: output.points.clone(),
            accuracy: accuracy.clone(),
            data_quality: output.data_quality,
            seasonality_detected: output.seasonality_detected,
            historical_point_count: output.historical_point_count,
            saved: false,
            saved_count: 0,
            persistence_error: None,
            batch_id: None,
        };

        if request.auto_save {
            let key = ForecastKey {
                subject: request.subject.clone(),
                division_id: request.division_id.clone(),
                granularity: request.granularity,
            };
            match self.persist(conn, key, &output, accuracy, caller, now) {
                Ok((batch_id, count)) => {
                    response.saved = true;
                    response.saved_count = count;
                    response.batch_id = Some(batch_id);
                }
                Err(e) => {
                    tracing::warn!(subject = %request.subject, error = %e, "Forecast computed but not saved");
                    response.persistence_error = Some(e.to_string());
                }
            }
        }

        tracing::info!(
            subject = %request.subject,
            granularity = %request.granularity,
            points = response.points.len(),
            quality = %response.data_quality,
            saved = response.saved,
            "Forecast generated"
        );
        Ok(response)
    }

    fn persist(
        &self,
        conn: &Connection,
        key: ForecastKey,
        output: &ForecastOutput,
        accuracy: ModelAccuracy,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> Result<(Uuid, usize), DatabaseError> {
        let span = match (output.points.first(), output.points.last()) {
            (Some(first), Some(last)) => DateRange::new(first.date, last.date),
            _ => None,
        };
        let Some(date_range) = span else {
            return Err(DatabaseError::ConstraintViolation(
                "forecast batch has no points".into(),
            ));
        };

        let batch = PersistedForecastBatch {
            id: Uuid::new_v4(),
            key,
            date_range,
            model_version: self.config.model_version.clone(),
            points: output.points.clone(),
            accuracy,
            data_quality: output.data_quality,
            seasonality_detected: output.seasonality_detected,
            historical_point_count: output.historical_point_count,
            generated_by: caller.id.clone(),
            generated_at: now.naive_utc(),
        };
        let count = self.store.replace(conn, &batch)?;
        Ok((batch.id, count))
    }

    // ═══════════════════════════════════════════════════════════
    // Fetch
    // ═══════════════════════════════════════════════════════════

    /// Historical actuals plus a forecast for charting.
    ///
    /// Stored points overlapping the forecast range are returned verbatim.
    /// Otherwise the forecast is computed on the fly and not persisted. Too
    /// little history yields an empty forecast rather than an error.
    pub fn fetch(
        &self,
        conn: &Connection,
        divisions: &Mutex<DivisionCache>,
        caller: &Caller,
        request: &FetchRequest,
        now: DateTime<Utc>,
    ) -> Result<FetchResponse, ForecastError> {
        self.authorize(caller, &request.subject)?;
        self.check_horizon(request.granularity, request.periods_forecast)?;
        let window = self.history_window(request.granularity, request.periods_back, request.as_of, now)?;
        Self::check_division(conn, divisions, request.division_id.as_deref(), now)?;

        let merged = self.load_history(
            conn,
            &request.subject,
            request.division_id.as_deref(),
            window,
            request.granularity,
        )?;

        let last_bucket = bucket_start(window.end, request.granularity);
        let forecast_range = range_after(last_bucket, request.periods_forecast, request.granularity)
            .ok_or_else(|| ForecastError::InvalidRequest("empty forecast range".into()))?;
        let key = ForecastKey {
            subject: request.subject.clone(),
            division_id: request.division_id.clone(),
            granularity: request.granularity,
        };

        if let Some(batch) = self.cached(conn, &key, &forecast_range, now) {
            tracing::debug!(subject = %request.subject, points = batch.points.len(), "Forecast cache hit");
            return Ok(FetchResponse {
                historical: merged.points,
                forecast: batch.points,
                used_cache: true,
                data_quality: batch.data_quality,
                model_accuracy: Some(batch.accuracy),
            });
        }

        let settings = self.settings();
        if merged.points.len() < settings.min_points {
            tracing::debug!(
                subject = %request.subject,
                points = merged.points.len(),
                "Forecast cache miss, too little history to fit"
            );
            return Ok(FetchResponse {
                data_quality: engine::data_quality(merged.points.len(), &settings),
                historical: merged.points,
                forecast: Vec::new(),
                used_cache: false,
                model_accuracy: None,
            });
        }

        let output = engine::forecast(&merged.points, request.periods_forecast, request.granularity, &settings)?;
        let accuracy = accuracy::evaluate(&ForecastOutput::observed(&merged.points), &output.fit.fitted);
        tracing::debug!(subject = %request.subject, points = output.points.len(), "Forecast cache miss, computed");

        Ok(FetchResponse {
            historical: merged.points,
            forecast: output.points,
            used_cache: false,
            data_quality: output.data_quality,
            model_accuracy: Some(accuracy),
        })
    }

    /// Stored batch for the range, or `None` on miss, staleness or read failure.
    fn cached(
        &self,
        conn: &Connection,
        key: &ForecastKey,
        range: &DateRange,
        now: DateTime<Utc>,
    ) -> Option<PersistedForecastBatch> {
        match self.store.query(conn, key, range) {
            Ok(Some(batch)) if self.is_stale(&batch, now) => {
                tracing::debug!(subject = %key.subject, generated_at = %batch.generated_at, "Cached forecast expired");
                None
            }
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(subject = %key.subject, error = %e, "Forecast cache read failed, recomputing");
                None
            }
        }
    }

    fn is_stale(&self, batch: &PersistedForecastBatch, now: DateTime<Utc>) -> bool {
        match self.config.cache_max_age_minutes {
            Some(minutes) => now.naive_utc() - batch.generated_at > Duration::minutes(minutes),
            None => false,
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Invalidate / import
    // ═══════════════════════════════════════════════════════════

    /// Delete stored points for a key within a range. Returns the count removed.
    pub fn invalidate(
        &self,
        conn: &Connection,
        caller: &Caller,
        request: &InvalidateRequest,
    ) -> Result<usize, ForecastError> {
        self.authorize(caller, &request.subject)?;
        let range = DateRange::new(request.range.start, request.range.end).ok_or_else(|| {
            ForecastError::InvalidRequest(format!(
                "range end {} precedes start {}",
                request.range.end, request.range.start
            ))
        })?;
        let key = ForecastKey {
            subject: request.subject.clone(),
            division_id: request.division_id.clone(),
            granularity: request.granularity,
        };
        let deleted = self.store.delete(conn, &key, &range)?;
        tracing::info!(subject = %request.subject, deleted, "Forecast range invalidated");
        Ok(deleted)
    }

    /// Validate and insert manually entered tallies, all or nothing.
    pub fn import_aggregates(
        &self,
        conn: &Connection,
        divisions: &Mutex<DivisionCache>,
        caller: &Caller,
        rows: &[ImportRow],
        now: DateTime<Utc>,
    ) -> Result<ImportResponse, ForecastError> {
        if rows.is_empty() {
            return Err(ForecastError::InvalidRequest("no rows to import".into()));
        }
        for row in rows {
            self.authorize(caller, &row.subject)?;
        }

        let mut records = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let count = u32::try_from(row.count).map_err(|_| {
                ForecastError::InvalidRequest(format!("row {i}: count must be between 0 and {}", u32::MAX))
            })?;
            let provenance = row.provenance.trim();
            if provenance.is_empty() {
                return Err(ForecastError::InvalidRequest(format!("row {i}: provenance is required")));
            }
            Self::check_division(conn, divisions, row.division_id.as_deref(), now)?;

            records.push(ImportedAggregateRecord {
                id: Uuid::new_v4(),
                subject: row.subject.clone(),
                division_id: row.division_id.clone(),
                record_date: row.record_date,
                count,
                provenance: provenance.to_string(),
                note: row.note.clone(),
                created_at: now.naive_utc(),
            });
        }

        let inserted = db::insert_imported_records(conn, &records)?;
        tracing::info!(caller = %caller.id, inserted, "Imported aggregate records");
        Ok(ImportResponse { inserted })
    }
}
