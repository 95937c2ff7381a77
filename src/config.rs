use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::enums::{EventStatus, Granularity, SubjectKind};

/// Application-level constants
pub const APP_NAME: &str = "RhuForecast";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Label stored with every persisted batch so later model changes can be told apart.
pub const MODEL_VERSION: &str = "seasonal-decomp-v1";

/// Get the application data directory (~/RhuForecast/ on all platforms).
///
/// Falls back to the current directory when no home directory is available
/// (service accounts, minimal containers).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Get the SQLite database path
pub fn database_path() -> PathBuf {
    app_data_dir().join("forecast.db")
}

/// Get the optional JSON configuration file path
pub fn config_path() -> PathBuf {
    app_data_dir().join("forecast_config.json")
}

/// Filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,rhu_forecast=debug"
}

// ═══════════════════════════════════════════════════════════
// Forecast tunables
// ═══════════════════════════════════════════════════════════

/// Tunables for the forecasting engine and forecast store.
///
/// Every field has a default, so a partial JSON file only overrides
/// what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Fewer merged points than this and the engine refuses to fit.
    pub min_points: usize,
    /// Point count at which data quality is reported as high.
    pub high_quality_points: usize,
    /// Normal quantile for the prediction interval (~95% coverage).
    pub z_value: f64,
    /// Seasonal strength at or above which seasonality counts as detected.
    pub seasonality_strength_threshold: f64,
    pub default_lookback_days: u32,
    pub default_lookback_months: u32,
    /// Upper bound on requested history; each period becomes one bucket.
    pub max_lookback_days: u32,
    pub max_lookback_months: u32,
    pub max_horizon_days: u32,
    pub max_horizon_months: u32,
    /// Lifecycle states of raw events that count toward the series.
    pub countable_service_states: Vec<EventStatus>,
    pub countable_disease_states: Vec<EventStatus>,
    /// Cached batches older than this are treated as a miss. `None` disables expiry.
    pub cache_max_age_minutes: Option<i64>,
    pub division_cache_ttl_secs: i64,
    pub model_version: String,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_points: 7,
            high_quality_points: 30,
            z_value: 1.96,
            seasonality_strength_threshold: 0.3,
            default_lookback_days: 180,
            default_lookback_months: 36,
            max_lookback_days: 3660,
            max_lookback_months: 240,
            max_horizon_days: 365,
            max_horizon_months: 36,
            countable_service_states: vec![EventStatus::Completed],
            countable_disease_states: vec![EventStatus::Confirmed, EventStatus::Recovered],
            cache_max_age_minutes: None,
            division_cache_ttl_secs: 300,
            model_version: MODEL_VERSION.to_string(),
        }
    }
}

impl ForecastConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No forecast config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::info!(path = %path.display(), "Loaded forecast config");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_points < 2 {
            return Err(ConfigError::Invalid("min_points must be at least 2".into()));
        }
        if self.high_quality_points < self.min_points {
            return Err(ConfigError::Invalid(
                "high_quality_points must not be below min_points".into(),
            ));
        }
        if self.z_value.is_nan() || self.z_value <= 0.0 {
            return Err(ConfigError::Invalid("z_value must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.seasonality_strength_threshold) {
            return Err(ConfigError::Invalid(
                "seasonality_strength_threshold must be within 0..=1".into(),
            ));
        }
        for granularity in [Granularity::Daily, Granularity::Monthly] {
            if self.max_horizon(granularity) == 0 {
                return Err(ConfigError::Invalid(format!(
                    "max horizon for {granularity} forecasts must be at least 1"
                )));
            }
            let (default, max) = (self.default_lookback(granularity), self.max_lookback(granularity));
            if default == 0 || default > max {
                return Err(ConfigError::Invalid(format!(
                    "default {granularity} lookback {default} must be between 1 and the maximum {max}"
                )));
            }
        }
        Ok(())
    }

    pub fn countable_states(&self, kind: SubjectKind) -> &[EventStatus] {
        match kind {
            SubjectKind::Service => &self.countable_service_states,
            SubjectKind::Disease => &self.countable_disease_states,
        }
    }

    pub fn default_lookback(&self, granularity: Granularity) -> u32 {
        match granularity {
            Granularity::Daily => self.default_lookback_days,
            Granularity::Monthly => self.default_lookback_months,
        }
    }

    pub fn max_lookback(&self, granularity: Granularity) -> u32 {
        match granularity {
            Granularity::Daily => self.max_lookback_days,
            Granularity::Monthly => self.max_lookback_months,
        }
    }

    pub fn max_horizon(&self, granularity: Granularity) -> u32 {
        match granularity {
            Granularity::Daily => self.max_horizon_days,
            Granularity::Monthly => self.max_horizon_months,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
