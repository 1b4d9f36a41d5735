//! Forecast accuracy metrics
//!
//! All functions return NaN when the inputs differ in length or are empty.

use serde::{Deserialize, Serialize};

/// Floor applied to |actual| in MAPE so zero-customer weeks stay finite
const MAPE_EPSILON: f64 = f64::EPSILON;

fn comparable(actual: &[f64], predicted: &[f64]) -> bool {
    actual.len() == predicted.len() && !actual.is_empty()
}

/// Mean Absolute Error (MAE)
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if !comparable(actual, predicted) {
        return f64::NAN;
    }

    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs())
        .sum();

    sum / actual.len() as f64
}

/// Mean Squared Error (MSE)
pub fn mse(actual: &[f64], predicted: &[f64]) -> f64 {
    if !comparable(actual, predicted) {
        return f64::NAN;
    }

    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    sum / actual.len() as f64
}

/// Root Mean Squared Error (RMSE)
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    mse(actual, predicted).sqrt()
}

/// Mean Absolute Percentage Error (MAPE)
///
/// Returned as a fraction (0.08 means 8%). Each error is divided by
/// `max(|actual|, ε)`, so a zero actual yields a very large but finite term.
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    if !comparable(actual, predicted) {
        return f64::NAN;
    }

    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs() / a.abs().max(MAPE_EPSILON))
        .sum();

    sum / actual.len() as f64
}

/// Symmetric Mean Absolute Percentage Error (sMAPE), between 0 and 2
pub fn smape(actual: &[f64], predicted: &[f64]) -> f64 {
    if !comparable(actual, predicted) {
        return f64::NAN;
    }

    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| {
            let denom = a.abs() + p.abs();
            if denom > 1e-10 {
                2.0 * (a - p).abs() / denom
            } else {
                0.0
            }
        })
        .sum();

    sum / actual.len() as f64
}

/// R-squared (Coefficient of Determination)
///
/// 1.0 = perfect, 0.0 = same as mean prediction, negative = worse than mean.
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    if !comparable(actual, predicted) {
        return f64::NAN;
    }

    let mean = actual.iter().sum::<f64>() / actual.len() as f64;

    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    if ss_tot < 1e-10 {
        return if ss_res < 1e-10 { 1.0 } else { 0.0 };
    }

    1.0 - ss_res / ss_tot
}

/// All hold-out metrics at once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub mape: f64,
    pub smape: f64,
    pub r_squared: f64,
}

impl MetricsSummary {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        Self {
            mae: mae(actual, predicted),
            mse: mse(actual, predicted),
            rmse: rmse(actual, predicted),
            mape: mape(actual, predicted),
            smape: smape(actual, predicted),
            r_squared: r_squared(actual, predicted),
        }
    }
}
