//! Persisted forecast access behind a trait, so the service can be tested
//! against failing backends.

use rusqlite::Connection;

use crate::db::{self, DatabaseError};
use crate::models::{DateRange, ForecastKey, PersistedForecastBatch};

/// Reader/writer for persisted forecast batches.
pub trait ForecastStore: Send + Sync {
    /// Stored points for `key` overlapping `range`, if any.
    fn query(
        &self,
        conn: &Connection,
        key: &ForecastKey,
        range: &DateRange,
    ) -> Result<Option<PersistedForecastBatch>, DatabaseError>;

    /// Atomically replace the key's points inside the batch span.
    fn replace(&self, conn: &Connection, batch: &PersistedForecastBatch) -> Result<usize, DatabaseError>;

    /// Remove the key's points inside `range`.
    fn delete(&self, conn: &Connection, key: &ForecastKey, range: &DateRange) -> Result<usize, DatabaseError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteForecastStore;

impl ForecastStore for SqliteForecastStore {
    fn query(
        &self,
        conn: &Connection,
        key: &ForecastKey,
        range: &DateRange,
    ) -> Result<Option<PersistedForecastBatch>, DatabaseError> {
        db::query_forecast(conn, key, range)
    }

    fn replace(&self, conn: &Connection, batch: &PersistedForecastBatch) -> Result<usize, DatabaseError> {
        db::replace_forecast_batch(conn, batch)
    }

    fn delete(&self, conn: &Connection, key: &ForecastKey, range: &DateRange) -> Result<usize, DatabaseError> {
        db::delete_forecast_range(conn, key, range)
    }
}
