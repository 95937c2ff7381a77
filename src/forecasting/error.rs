//! Forecasting error taxonomy.
//!
//! Data and authorization errors abort a request. Persistence failures do
//! not appear here: they degrade to `saved = false` on generate and to a
//! cache miss on fetch.

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Insufficient data: {observed} historical points, at least {required} required")]
    InsufficientData { observed: usize, required: usize },

    #[error("Caller {caller} is not authorized for subject {subject}")]
    Unauthorized { caller: String, subject: String },

    #[error("Unknown geographic division: {0}")]
    UnknownDivision(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal lock error")]
    LockPoisoned,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for ForecastError {
    fn from(e: rusqlite::Error) -> Self {
        ForecastError::Database(DatabaseError::Sqlite(e))
    }
}
