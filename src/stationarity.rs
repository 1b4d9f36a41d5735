//! Stationarity testing and differencing order selection
//!
//! The Augmented Dickey-Fuller test regresses
//!
//! ```text
//! Δy_t = α + β·y_{t-1} + Σ γ_i·Δy_{t-i} + ε_t
//! ```
//!
//! and tests H0: β = 0 (unit root, non-stationary) against H1: β < 0.
//! The number of lagged differences is chosen by AIC, p-values follow
//! MacKinnon (1994) and critical values MacKinnon (2010), both for the
//! constant-only specification.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

use crate::error::{PatronageError, Result};
use crate::regression::least_squares;

/// MacKinnon (1994) bounds and polynomials for the constant-only case
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

/// MacKinnon (2010) response surface coefficients for 1%, 5% and 10%
const CRITICAL_SURFACE: [(&str, [f64; 4]); 3] = [
    ("1%", [-3.43035, -6.5393, -16.786, -79.433]),
    ("5%", [-2.86154, -2.8903, -4.234, -40.040]),
    ("10%", [-2.56677, -1.5384, -2.809, 0.0]),
];

/// Outcome of an Augmented Dickey-Fuller test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdfResult {
    /// t-statistic of the lagged level coefficient
    pub statistic: f64,
    pub p_value: f64,
    /// Lagged differences kept by the AIC search
    pub used_lag: usize,
    /// Observations in the final regression
    pub n_obs: usize,
    pub critical_values: Vec<(String, f64)>,
    /// Whether the unit root is rejected at the requested significance
    pub is_stationary: bool,
}

/// Recommended differencing order together with the tests behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferencingChoice {
    pub order: usize,
    /// Tests in the order they were run: level, then first difference
    pub tests: Vec<AdfResult>,
}

/// Apply first differences `order` times
pub fn difference(data: &[f64], order: usize) -> Vec<f64> {
    let mut result = data.to_vec();
    for _ in 0..order {
        if result.len() <= 1 {
            return Vec::new();
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Default upper bound on ADF lags: ⌈12·(n/100)^(1/4)⌉
pub fn default_max_lag(n: usize) -> usize {
    (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize
}

/// Run the Augmented Dickey-Fuller test with a constant
///
/// # Arguments
/// * `data` - Series to test
/// * `max_lag` - Upper bound for the AIC lag search (defaults to 12·(n/100)^¼)
/// * `significance` - Level at which the unit root is rejected
pub fn adf_test(data: &[f64], max_lag: Option<usize>, significance: f64) -> Result<AdfResult> {
    const MIN_OBS: usize = 8;
    let n = data.len();
    if n < MIN_OBS {
        return Err(PatronageError::InsufficientData {
            required: MIN_OBS,
            actual: n,
        });
    }
    if data.iter().any(|x| !x.is_finite()) {
        return Err(PatronageError::InvalidData(
            "series contains NaN or infinite values".to_string(),
        ));
    }
    let first = data[0];
    if data.iter().all(|x| (x - first).abs() < 1e-12) {
        return Err(PatronageError::InvalidData(
            "series is constant, stationarity is undefined".to_string(),
        ));
    }

    let diff = difference(data, 1);

    // Each candidate regression needs more observations than its 2 + lag parameters
    let estimable = (n.saturating_sub(4)) / 2;
    let max_lag = max_lag.unwrap_or_else(|| default_max_lag(n)).min(estimable);

    // Lag search on a common sample that starts after max_lag
    let mut best: Option<(f64, usize)> = None;
    for lag in 0..=max_lag {
        let fit = adf_regression(data, &diff, lag, max_lag)?;
        let aic = fit.n_obs as f64 * (fit.sse / fit.n_obs as f64).ln() + 2.0 * (lag + 2) as f64;
        if best.map_or(true, |(best_aic, _)| aic < best_aic) {
            best = Some((aic, lag));
        }
    }
    let used_lag = best.map_or(0, |(_, lag)| lag);

    let fit = adf_regression(data, &diff, used_lag, used_lag)?;
    let p_value = mackinnon_p_value(fit.statistic);
    let critical_values = critical_values(fit.n_obs);

    debug!(
        statistic = fit.statistic,
        p_value,
        used_lag,
        n_obs = fit.n_obs,
        "ADF test"
    );

    Ok(AdfResult {
        statistic: fit.statistic,
        p_value,
        used_lag,
        n_obs: fit.n_obs,
        critical_values,
        is_stationary: p_value <= significance,
    })
}

/// Recommend a differencing order from successive ADF tests
///
/// Returns 0 when the series itself is stationary, 1 when its first
/// difference is, and 2 otherwise.
pub fn select_differencing_order(data: &[f64], significance: f64) -> Result<DifferencingChoice> {
    let level = adf_test(data, None, significance)?;
    if level.is_stationary {
        return Ok(DifferencingChoice {
            order: 0,
            tests: vec![level],
        });
    }

    let first = adf_test(&difference(data, 1), None, significance)?;
    let order = if first.is_stationary { 1 } else { 2 };
    Ok(DifferencingChoice {
        order,
        tests: vec![level, first],
    })
}

struct AdfFit {
    statistic: f64,
    sse: f64,
    n_obs: usize,
}

/// Estimate β and its t-statistic by partialling out the other regressors
fn adf_regression(data: &[f64], diff: &[f64], lag: usize, start: usize) -> Result<AdfFit> {
    // Δy_t for t = start..diff.len(), paired with y_{t} (the level before the change)
    let targets: Vec<f64> = diff[start..].to_vec();
    let levels: Vec<f64> = data[start..diff.len()].to_vec();
    let others: Vec<Vec<f64>> = (start..diff.len())
        .map(|t| (1..=lag).map(|i| diff[t - i]).collect())
        .collect();
    let n_obs = targets.len();

    let level_fit = least_squares(&others, &levels, true)?;
    let target_fit = least_squares(&others, &targets, true)?;

    let r = &level_fit.residuals;
    let u = &target_fit.residuals;
    let rr: f64 = r.iter().map(|x| x * x).sum();
    if rr < 1e-12 {
        return Err(PatronageError::Numerical(
            "lagged level is collinear with the lagged differences".to_string(),
        ));
    }
    let beta = r.iter().zip(u).map(|(a, b)| a * b).sum::<f64>() / rr;
    let sse: f64 = r
        .iter()
        .zip(u)
        .map(|(a, b)| (b - beta * a).powi(2))
        .sum();

    let dof = n_obs.saturating_sub(lag + 2);
    if dof == 0 {
        return Err(PatronageError::InsufficientData {
            required: lag + 3,
            actual: n_obs,
        });
    }
    let sigma2 = sse / dof as f64;
    let se = (sigma2 / rr).sqrt();
    let statistic = if se > 0.0 { beta / se } else { f64::NEG_INFINITY };

    Ok(AdfFit {
        statistic,
        sse: sse.max(f64::MIN_POSITIVE),
        n_obs,
    })
}

/// Approximate p-value of an ADF statistic (MacKinnon 1994, constant only)
pub fn mackinnon_p_value(statistic: f64) -> f64 {
    if statistic > TAU_MAX {
        return 1.0;
    }
    if statistic < TAU_MIN {
        return 0.0;
    }
    let coefficients: &[f64] = if statistic <= TAU_STAR {
        &TAU_SMALL_P
    } else {
        &TAU_LARGE_P
    };
    let z = coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * statistic + c);
    standard_normal().cdf(z)
}

/// Finite-sample critical values (MacKinnon 2010, constant only)
pub fn critical_values(n_obs: usize) -> Vec<(String, f64)> {
    let n = n_obs as f64;
    CRITICAL_SURFACE
        .iter()
        .map(|(level, c)| {
            let value = c[0] + c[1] / n + c[2] / n.powi(2) + c[3] / n.powi(3);
            (level.to_string(), value)
        })
        .collect()
}

pub(crate) fn standard_normal() -> Normal {
    Normal::standard()
}
