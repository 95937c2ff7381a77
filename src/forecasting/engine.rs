//! Seasonal Forecasting Engine.
//!
//! Fixed-structure additive model: `y(t) = trend(t) + seasonal(t mod period)`.
//! The period comes from the granularity (7 for daily, 12 for monthly), so
//! there is no order search. Every call refits from scratch.
//!
//! - Trend: least-squares line over the time index when the series spans at
//!   least two full periods, otherwise a flat moving average of the last
//!   period's worth of points.
//! - Seasonal: mean detrended value per position in the period, centered on
//!   zero. Estimated only with at least two full periods; zero otherwise.
//! - Interval: `z * sigma * sqrt(1 + h / period)` around the point forecast,
//!   where sigma is the residual standard deviation of the in-sample fit.

use chrono::NaiveDate;
use serde::Serialize;

use super::calendar::{bucket_start, step_bucket};
use super::error::ForecastError;
use crate::config::ForecastConfig;
use crate::models::enums::{DataQuality, Granularity};
use crate::models::{ForecastPoint, HistoricalPoint};

// ═══════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════

/// Engine thresholds, taken from [`ForecastConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub min_points: usize,
    pub high_quality_points: usize,
    pub z_value: f64,
    pub seasonality_strength_threshold: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&ForecastConfig::default())
    }
}

impl From<&ForecastConfig> for EngineSettings {
    fn from(config: &ForecastConfig) -> Self {
        Self {
            min_points: config.min_points,
            high_quality_points: config.high_quality_points,
            z_value: config.z_value,
            seasonality_strength_threshold: config.seasonality_strength_threshold,
        }
    }
}

/// Quality tier by point count. Informs display and interpretation only.
pub fn data_quality(point_count: usize, settings: &EngineSettings) -> DataQuality {
    if point_count < settings.min_points {
        DataQuality::Insufficient
    } else if point_count < settings.high_quality_points {
        DataQuality::Moderate
    } else {
        DataQuality::High
    }
}

// ═══════════════════════════════════════════════════════════
// Model components
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum TrendModel {
    /// `intercept + slope * t` over the time index.
    Linear { intercept: f64, slope: f64 },
    /// Flat level: mean of the trailing `window` points.
    MovingAverage { level: f64, window: usize },
}

impl TrendModel {
    pub fn value_at(&self, t: usize) -> f64 {
        match *self {
            TrendModel::Linear { intercept, slope } => intercept + slope * t as f64,
            TrendModel::MovingAverage { level, .. } => level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalComponent {
    pub period: usize,
    /// One additive offset per position in the period, summing to zero.
    pub offsets: Vec<f64>,
    /// False when the series was too short and every offset is zero.
    pub estimated: bool,
    /// `1 - var(residual) / var(detrended)`, clamped to [0, 1].
    pub strength: f64,
}

impl SeasonalComponent {
    fn flat(period: usize) -> Self {
        Self {
            period,
            offsets: vec![0.0; period],
            estimated: false,
            strength: 0.0,
        }
    }

    pub fn offset_at(&self, t: usize) -> f64 {
        self.offsets[t % self.period]
    }
}

/// Trend plus seasonal fit over the historical window.
#[derive(Debug, Clone, Serialize)]
pub struct ModelFit {
    pub trend: TrendModel,
    pub seasonal: SeasonalComponent,
    /// In-sample fitted values, clamped to zero like forecasts.
    pub fitted: Vec<f64>,
    pub residuals: Vec<f64>,
    pub residual_std_dev: f64,
}

impl ModelFit {
    /// Point value at time index `t`, clamped to zero.
    pub fn predict(&self, t: usize) -> f64 {
        (self.trend.value_at(t) + self.seasonal.offset_at(t)).max(0.0)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    mean(&values.iter().map(|v| (v - m).powi(2)).collect::<Vec<_>>())
}

/// Sample standard deviation (n - 1 denominator). Zero below two values.
fn std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

fn linear_trend(values: &[f64]) -> TrendModel {
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = mean(values);
    let mut ss_xy = 0.0;
    let mut ss_xx = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        ss_xy += dx * (y - mean_y);
        ss_xx += dx * dx;
    }
    if ss_xx.abs() < 1e-10 {
        return TrendModel::Linear { intercept: mean_y, slope: 0.0 };
    }
    let slope = ss_xy / ss_xx;
    TrendModel::Linear {
        intercept: mean_y - slope * mean_x,
        slope,
    }
}

fn moving_average_trend(values: &[f64], period: usize) -> TrendModel {
    let window = period.min(values.len()).max(1);
    let tail = &values[values.len().saturating_sub(window)..];
    TrendModel::MovingAverage { level: mean(tail), window }
}

fn seasonal_component(detrended: &[f64], period: usize) -> SeasonalComponent {
    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, d) in detrended.iter().enumerate() {
        sums[i % period] += d;
        counts[i % period] += 1;
    }
    let mut offsets: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect();

    let center = mean(&offsets);
    for o in &mut offsets {
        *o -= center;
    }

    let remainder: Vec<f64> = detrended
        .iter()
        .enumerate()
        .map(|(i, d)| d - offsets[i % period])
        .collect();
    let detrended_var = variance(detrended);
    let strength = if detrended_var > 1e-12 {
        (1.0 - variance(&remainder) / detrended_var).clamp(0.0, 1.0)
    } else {
        0.0
    };

    SeasonalComponent {
        period,
        offsets,
        estimated: true,
        strength,
    }
}

/// Fit trend and seasonal components to `values` with the given period.
pub fn fit(values: &[f64], period: usize) -> ModelFit {
    let period = period.max(1);
    let seasonal_ready = values.len() >= 2 * period;

    let trend = if seasonal_ready {
        linear_trend(values)
    } else {
        moving_average_trend(values, period)
    };

    let seasonal = if seasonal_ready {
        let detrended: Vec<f64> = values
            .iter()
            .enumerate()
            .map(|(t, y)| y - trend.value_at(t))
            .collect();
        seasonal_component(&detrended, period)
    } else {
        SeasonalComponent::flat(period)
    };

    let mut fit = ModelFit {
        trend,
        seasonal,
        fitted: Vec::with_capacity(values.len()),
        residuals: Vec::with_capacity(values.len()),
        residual_std_dev: 0.0,
    };
    for (t, y) in values.iter().enumerate() {
        let f = fit.predict(t);
        fit.fitted.push(f);
        fit.residuals.push(y - f);
    }
    fit.residual_std_dev = std_dev(&fit.residuals);
    fit
}

/// Half-width of the prediction interval `h` steps past the last observation.
pub fn bound_width(residual_std_dev: f64, z_value: f64, h: u32, period: usize) -> f64 {
    z_value * residual_std_dev * (1.0 + f64::from(h) / period.max(1) as f64).sqrt()
}

// ═══════════════════════════════════════════════════════════
// Forecast
// ═══════════════════════════════════════════════════════════

/// Forecast plus the fit and metadata behind it.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastOutput {
    pub points: Vec<ForecastPoint>,
    pub fit: ModelFit,
    pub data_quality: DataQuality,
    pub seasonality_detected: bool,
    pub historical_point_count: usize,
    pub seasonal_period: usize,
}

impl ForecastOutput {
    /// Observed values in fit order, for scoring.
    pub fn observed(series: &[HistoricalPoint]) -> Vec<f64> {
        series.iter().map(|p| p.value as f64).collect()
    }
}

/// Fit the series and produce `horizon` future points.
///
/// Output dates step one period at a time from the last historical date
/// (first-of-month for monthly series). Fails with `InsufficientData` below
/// the configured minimum point count.
pub fn forecast(
    series: &[HistoricalPoint],
    horizon: u32,
    granularity: Granularity,
    settings: &EngineSettings,
) -> Result<ForecastOutput, ForecastError> {
    let n = series.len();
    if n < settings.min_points {
        return Err(ForecastError::InsufficientData {
            observed: n,
            required: settings.min_points,
        });
    }
    if let Some(pair) = series.windows(2).find(|w| w[0].date >= w[1].date) {
        return Err(ForecastError::InvalidRequest(format!(
            "historical dates must be strictly increasing ({} then {})",
            pair[0].date, pair[1].date
        )));
    }

    let period = granularity.seasonal_period();
    let values = ForecastOutput::observed(series);
    let model = fit(&values, period);

    let last_date: NaiveDate = bucket_start(series[n - 1].date, granularity);
    let points: Vec<ForecastPoint> = (1..=horizon)
        .map(|h| {
            let t = n - 1 + h as usize;
            let predicted = model.predict(t);
            let width = bound_width(model.residual_std_dev, settings.z_value, h, period);
            ForecastPoint {
                date: step_bucket(last_date, granularity, h),
                predicted_value: predicted,
                lower_bound: (predicted - width).max(0.0),
                upper_bound: predicted + width,
            }
        })
        .collect();

    let seasonality_detected = model.seasonal.estimated
        && model.seasonal.strength >= settings.seasonality_strength_threshold;

    Ok(ForecastOutput {
        points,
        data_quality: data_quality(n, settings),
        seasonality_detected,
        historical_point_count: n,
        seasonal_period: period,
        fit: model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration, Weekday};

    fn daily(start: NaiveDate, values: &[u64]) -> Vec<HistoricalPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| HistoricalPoint { date: start + Duration::days(i as i64), value })
            .collect()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn settings() -> EngineSettings {
        EngineSettings::default()
    }

    /// 2024-01-01 is a Monday.
    fn weekday_pattern(days: usize) -> Vec<HistoricalPoint> {
        let start = d(2024, 1, 1);
        (0..days)
            .map(|i| {
                let date = start + Duration::days(i as i64);
                let value = match date.weekday() {
                    Weekday::Sat | Weekday::Sun => 0,
                    _ => 10,
                };
                HistoricalPoint { date, value }
            })
            .collect()
    }

    #[test]
    fn flat_series_forecasts_its_level() {
        let series = daily(d(2024, 3, 1), &[5; 10]);
        let out = forecast(&series, 5, Granularity::Daily, &settings()).unwrap();

        assert_eq!(out.points.len(), 5);
        for p in &out.points {
            assert!((p.predicted_value - 5.0).abs() < 1e-9);
            assert!((p.upper_bound - p.predicted_value - (p.predicted_value - p.lower_bound)).abs() < 1e-9);
        }
        assert!(!out.fit.seasonal.estimated);
        assert!(!out.seasonality_detected);
        assert_eq!(out.data_quality, DataQuality::Moderate);
    }

    #[test]
    fn weekly_pattern_is_detected_and_repeated() {
        let series = weekday_pattern(30);
        let out = forecast(&series, 14, Granularity::Daily, &settings()).unwrap();

        assert!(out.fit.seasonal.estimated);
        assert!(out.seasonality_detected);
        assert_eq!(out.data_quality, DataQuality::High);
        for p in &out.points {
            match p.date.weekday() {
                Weekday::Sat | Weekday::Sun => assert!(p.predicted_value < 3.0, "{p:?}"),
                _ => assert!(p.predicted_value > 7.0, "{p:?}"),
            }
        }
        // Same weekday one week apart forecasts nearly the same value.
        for h in 0..7 {
            let diff = (out.points[h].predicted_value - out.points[h + 7].predicted_value).abs();
            assert!(diff < 1.0, "week-over-week drift {diff} at step {h}");
        }
    }

    #[test]
    fn too_few_points_is_insufficient() {
        let series = daily(d(2024, 3, 1), &[3; 6]);
        let err = forecast(&series, 3, Granularity::Daily, &settings()).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { observed: 6, required: 7 }));
    }

    #[test]
    fn output_dates_step_one_period() {
        let series = daily(d(2024, 2, 20), &[1, 4, 2, 6, 3, 5, 2, 7, 4]);
        let out = forecast(&series, 12, Granularity::Daily, &settings()).unwrap();

        assert_eq!(out.points.len(), 12);
        assert_eq!(out.points[0].date, d(2024, 2, 29));
        for w in out.points.windows(2) {
            assert_eq!(w[1].date, w[0].date + Duration::days(1));
        }
    }

    #[test]
    fn monthly_dates_are_first_of_month() {
        let series: Vec<HistoricalPoint> = (0..8)
            .map(|i| HistoricalPoint {
                date: step_bucket(d(2023, 5, 1), Granularity::Monthly, i),
                value: 20 + u64::from(i),
            })
            .collect();
        let out = forecast(&series, 3, Granularity::Monthly, &settings()).unwrap();
        let dates: Vec<NaiveDate> = out.points.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![d(2024, 1, 1), d(2024, 2, 1), d(2024, 3, 1)]);
    }

    #[test]
    fn bounds_are_ordered_non_negative_and_widen() {
        let series = daily(d(2024, 1, 1), &[0, 1, 0, 9, 0, 2, 0, 14, 1, 0, 3, 0, 1, 8, 0, 2]);
        let out = forecast(&series, 30, Granularity::Daily, &settings()).unwrap();

        let mut previous_width = 0.0;
        for p in &out.points {
            assert!(p.lower_bound >= 0.0);
            assert!(p.lower_bound <= p.predicted_value);
            assert!(p.predicted_value <= p.upper_bound);
            let width = p.upper_bound - p.predicted_value;
            assert!(width >= previous_width);
            previous_width = width;
        }
    }

    #[test]
    fn bound_width_grows_with_sqrt_of_step() {
        let w7 = bound_width(2.0, 1.96, 7, 7);
        assert!((w7 - 1.96 * 2.0 * 2f64.sqrt()).abs() < 1e-12);
        assert!(bound_width(2.0, 1.96, 8, 7) > w7);
        assert_eq!(bound_width(0.0, 1.96, 30, 7), 0.0);
    }

    #[test]
    fn forecast_is_deterministic() {
        let series = weekday_pattern(45);
        let a = forecast(&series, 20, Granularity::Daily, &settings()).unwrap();
        let b = forecast(&series, 20, Granularity::Daily, &settings()).unwrap();
        let bits = |o: &ForecastOutput| -> Vec<(u64, u64, u64)> {
            o.points
                .iter()
                .map(|p| (p.predicted_value.to_bits(), p.lower_bound.to_bits(), p.upper_bound.to_bits()))
                .collect()
        };
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn linear_growth_extrapolates() {
        let values: Vec<u64> = (0..21).map(|i| 10 + 2 * i).collect();
        let series = daily(d(2024, 4, 1), &values);
        let out = forecast(&series, 3, Granularity::Daily, &settings()).unwrap();

        assert!(matches!(out.fit.trend, TrendModel::Linear { slope, .. } if (slope - 2.0).abs() < 1e-9));
        assert!((out.points[0].predicted_value - 52.0).abs() < 1e-6);
        assert!((out.points[2].predicted_value - 56.0).abs() < 1e-6);
    }

    #[test]
    fn short_series_uses_moving_average() {
        let series = daily(d(2024, 4, 1), &[2, 2, 2, 2, 2, 2, 9, 9, 9, 9, 9, 9, 9]);
        let out = forecast(&series, 1, Granularity::Daily, &settings()).unwrap();
        assert!(matches!(out.fit.trend, TrendModel::MovingAverage { window: 7, .. }));
        assert!((out.points[0].predicted_value - 9.0).abs() < 1e-9);
    }

    #[test]
    fn declining_series_never_forecasts_negative() {
        let values: Vec<u64> = (0..20).map(|i| 40u64.saturating_sub(3 * i)).collect();
        let series = daily(d(2024, 4, 1), &values);
        let out = forecast(&series, 30, Granularity::Daily, &settings()).unwrap();
        assert!(out.points.iter().all(|p| p.predicted_value >= 0.0 && p.lower_bound >= 0.0));
    }

    #[test]
    fn unordered_dates_rejected() {
        let mut series = daily(d(2024, 4, 1), &[1; 8]);
        series.swap(2, 3);
        let err = forecast(&series, 1, Granularity::Daily, &settings()).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidRequest(_)));
    }

    #[test]
    fn quality_tiers() {
        let s = settings();
        assert_eq!(data_quality(6, &s), DataQuality::Insufficient);
        assert_eq!(data_quality(7, &s), DataQuality::Moderate);
        assert_eq!(data_quality(29, &s), DataQuality::Moderate);
        assert_eq!(data_quality(30, &s), DataQuality::High);
    }
}
