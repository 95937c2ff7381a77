//! Request and response shapes for the forecasting service.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enums::{DataQuality, Granularity};
use crate::models::{DateRange, ForecastPoint, HistoricalPoint, ModelAccuracy, Subject};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub subject: Subject,
    /// Geographic filter; `None` means system-wide.
    #[serde(default)]
    pub division_id: Option<String>,
    /// Number of future periods.
    pub horizon: u32,
    pub granularity: Granularity,
    #[serde(default)]
    pub auto_save: bool,
    /// Historical periods to fit on. Defaults per granularity from config.
    #[serde(default)]
    pub periods_back: Option<u32>,
    /// Reference date. Defaults to today.
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    pub points: Vec<ForecastPoint>,
    pub accuracy: ModelAccuracy,
    pub data_quality: DataQuality,
    pub seasonality_detected: bool,
    pub historical_point_count: usize,
    pub saved: bool,
    pub saved_count: usize,
    /// Set when `auto_save` was requested and the replace failed.
    pub persistence_error: Option<String>,
    pub batch_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub subject: Subject,
    #[serde(default)]
    pub division_id: Option<String>,
    pub granularity: Granularity,
    #[serde(default)]
    pub periods_back: Option<u32>,
    pub periods_forecast: u32,
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

/// Chart-ready actuals and forecast.
#[derive(Debug, Clone, Serialize)]
pub struct FetchResponse {
    pub historical: Vec<HistoricalPoint>,
    pub forecast: Vec<ForecastPoint>,
    pub used_cache: bool,
    pub data_quality: DataQuality,
    /// `None` when history was too short to fit.
    pub model_accuracy: Option<ModelAccuracy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidateRequest {
    pub subject: Subject,
    #[serde(default)]
    pub division_id: Option<String>,
    pub granularity: Granularity,
    pub range: DateRange,
}

/// One manually entered tally, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRow {
    pub subject: Subject,
    #[serde(default)]
    pub division_id: Option<String>,
    pub record_date: NaiveDate,
    /// Signed so negative input can be rejected with a message.
    pub count: i64,
    pub provenance: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResponse {
    pub inserted: usize,
}
