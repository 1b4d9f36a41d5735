//! Ordinary least squares on top of linfa-linear

use linfa::prelude::*;
use linfa::Dataset;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2};

use crate::error::{PatronageError, Result};

/// Fitted least-squares regression
#[derive(Debug, Clone)]
pub(crate) struct LeastSquares {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub residuals: Vec<f64>,
}

impl LeastSquares {
    pub fn sse(&self) -> f64 {
        self.residuals.iter().map(|r| r * r).sum()
    }
}

/// Regress `targets` on the regressor `rows` (one row per observation)
pub(crate) fn least_squares(
    rows: &[Vec<f64>],
    targets: &[f64],
    intercept: bool,
) -> Result<LeastSquares> {
    let n = targets.len();
    if rows.len() != n {
        return Err(PatronageError::InvalidData(format!(
            "{} regressor rows for {} targets",
            rows.len(),
            n
        )));
    }
    let k = rows.first().map_or(0, Vec::len);
    let params = k + usize::from(intercept);
    if n <= params {
        return Err(PatronageError::InsufficientData {
            required: params + 1,
            actual: n,
        });
    }

    if k == 0 {
        let level = if intercept {
            targets.iter().sum::<f64>() / n as f64
        } else {
            0.0
        };
        return Ok(LeastSquares {
            coefficients: Vec::new(),
            intercept: level,
            residuals: targets.iter().map(|y| y - level).collect(),
        });
    }

    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    let records = Array2::from_shape_vec((n, k), flat)
        .map_err(|e| PatronageError::InvalidData(e.to_string()))?;
    let y = Array1::from_vec(targets.to_vec());

    let dataset = Dataset::new(records.clone(), y.clone());
    let fitted = LinearRegression::new()
        .with_intercept(intercept)
        .fit(&dataset)
        .map_err(|e| PatronageError::Numerical(e.to_string()))?;

    let coefficients = fitted.params().to_vec();
    let fitted_intercept = fitted.intercept();
    if coefficients.iter().any(|c| !c.is_finite()) || !fitted_intercept.is_finite() {
        return Err(PatronageError::Numerical(
            "least squares produced non-finite coefficients".to_string(),
        ));
    }

    let predicted = records.dot(fitted.params()) + fitted_intercept;
    let residuals = (&y - &predicted).to_vec();

    Ok(LeastSquares {
        coefficients,
        intercept: fitted_intercept,
        residuals,
    })
}
