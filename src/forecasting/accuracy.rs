//! Accuracy Evaluator: in-sample error metrics for a fitted model.
//!
//! Descriptive only; nothing here feeds back into fitting.

use crate::models::enums::AccuracyInterpretation;
use crate::models::ModelAccuracy;

/// Variance below this is treated as zero.
const ZERO_VARIANCE: f64 = 1e-12;

/// Compute MSE, RMSE, MAE, R², a confidence level and its qualitative band.
///
/// Only the overlapping prefix of `observed` and `fitted` is scored. With no
/// overlap every error is zero and R² is zero.
pub fn evaluate(observed: &[f64], fitted: &[f64]) -> ModelAccuracy {
    let n = observed.len().min(fitted.len());
    if n == 0 {
        return ModelAccuracy {
            mse: 0.0,
            rmse: 0.0,
            mae: 0.0,
            r_squared: 0.0,
            confidence_level: 0.0,
            interpretation: AccuracyInterpretation::Poor,
        };
    }
    let observed = &observed[..n];
    let fitted = &fitted[..n];

    let mut sse = 0.0;
    let mut sae = 0.0;
    for (o, f) in observed.iter().zip(fitted) {
        let r = o - f;
        sse += r * r;
        sae += r.abs();
    }
    let mse = sse / n as f64;
    let r_squared = r_squared(observed, fitted);

    ModelAccuracy {
        mse,
        rmse: mse.sqrt(),
        mae: sae / n as f64,
        r_squared,
        confidence_level: confidence_from_r_squared(r_squared),
        interpretation: interpret(r_squared),
    }
}

/// Coefficient of determination, `1 - SS_res / SS_tot`.
///
/// A constant observed series has `SS_tot = 0`, which leaves R² as 0/0.
/// Policy: R² is 1 when the fit reproduces the constant exactly and 0
/// otherwise.
pub fn r_squared(observed: &[f64], fitted: &[f64]) -> f64 {
    let n = observed.len().min(fitted.len());
    if n == 0 {
        return 0.0;
    }
    let mean = observed[..n].iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = observed[..n].iter().map(|o| (o - mean).powi(2)).sum();
    let ss_res: f64 = observed[..n]
        .iter()
        .zip(&fitted[..n])
        .map(|(o, f)| (o - f).powi(2))
        .sum();

    if ss_tot <= ZERO_VARIANCE * n as f64 {
        return if ss_res <= ZERO_VARIANCE * n as f64 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Monotone map of R² into [0, 1]: negative R² is no confidence.
pub fn confidence_from_r_squared(r_squared: f64) -> f64 {
    if r_squared.is_nan() {
        return 0.0;
    }
    r_squared.clamp(0.0, 1.0)
}

pub fn interpret(r_squared: f64) -> AccuracyInterpretation {
    if r_squared >= 0.9 {
        AccuracyInterpretation::Excellent
    } else if r_squared >= 0.7 {
        AccuracyInterpretation::Good
    } else if r_squared >= 0.5 {
        AccuracyInterpretation::Fair
    } else {
        AccuracyInterpretation::Poor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_fit_scores_excellent() {
        let observed = [1.0, 2.0, 3.0, 4.0];
        let acc = evaluate(&observed, &observed);
        assert_eq!(acc.mse, 0.0);
        assert_eq!(acc.r_squared, 1.0);
        assert_eq!(acc.confidence_level, 1.0);
        assert_eq!(acc.interpretation, AccuracyInterpretation::Excellent);
    }

    #[test]
    fn metrics_match_hand_computation() {
        let observed = [2.0, 4.0, 6.0, 8.0];
        let fitted = [3.0, 4.0, 5.0, 8.0];
        let acc = evaluate(&observed, &fitted);
        // residuals: -1, 0, 1, 0
        assert!((acc.mse - 0.5).abs() < 1e-12);
        assert!((acc.rmse - 0.5f64.sqrt()).abs() < 1e-12);
        assert!((acc.mae - 0.5).abs() < 1e-12);
        // SS_tot = 20, SS_res = 2
        assert!((acc.r_squared - 0.9).abs() < 1e-12);
    }

    #[test]
    fn constant_series_policy() {
        let flat = [5.0; 10];
        assert_eq!(r_squared(&flat, &flat), 1.0);
        assert_eq!(r_squared(&flat, &[4.0; 10]), 0.0);
    }

    #[test]
    fn worse_than_mean_is_negative_with_zero_confidence() {
        let observed = [1.0, 2.0, 3.0];
        let fitted = [3.0, 2.0, 1.0];
        let acc = evaluate(&observed, &fitted);
        assert!(acc.r_squared < 0.0);
        assert_eq!(acc.confidence_level, 0.0);
        assert_eq!(acc.interpretation, AccuracyInterpretation::Poor);
    }

    #[test]
    fn interpretation_bands() {
        assert_eq!(interpret(0.95), AccuracyInterpretation::Excellent);
        assert_eq!(interpret(0.9), AccuracyInterpretation::Excellent);
        assert_eq!(interpret(0.7), AccuracyInterpretation::Good);
        assert_eq!(interpret(0.5), AccuracyInterpretation::Fair);
        assert_eq!(interpret(0.49), AccuracyInterpretation::Poor);
    }

    #[test]
    fn confidence_is_monotone() {
        let samples = [-2.0, -0.1, 0.0, 0.3, 0.6, 0.99, 1.0];
        let levels: Vec<f64> = samples.iter().map(|r| confidence_from_r_squared(*r)).collect();
        assert!(levels.windows(2).all(|w| w[0] <= w[1]));
        assert!(levels.iter().all(|l| (0.0..=1.0).contains(l)));
    }

    #[test]
    fn empty_input_is_poor() {
        let acc = evaluate(&[], &[]);
        assert_eq!(acc.interpretation, AccuracyInterpretation::Poor);
    }
}
