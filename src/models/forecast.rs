use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AccuracyInterpretation, DataQuality};
use super::filters::{DateRange, ForecastKey};

/// One bucket of the merged historical series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub date: NaiveDate,
    pub value: u64,
}

/// A future point with its prediction interval.
/// `lower_bound <= predicted_value <= upper_bound`, all non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// In-sample fit quality of one model run. Never stored apart from its batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAccuracy {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r_squared: f64,
    pub confidence_level: f64,
    pub interpretation: AccuracyInterpretation,
}

/// A stored forecast run, replaced wholesale for its date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedForecastBatch {
    pub id: Uuid,
    pub key: ForecastKey,
    pub date_range: DateRange,
    pub model_version: String,
    pub points: Vec<ForecastPoint>,
    pub accuracy: ModelAccuracy,
    pub data_quality: DataQuality,
    pub seasonality_detected: bool,
    pub historical_point_count: usize,
    pub generated_by: String,
    pub generated_at: NaiveDateTime,
}
