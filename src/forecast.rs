//! Forecast bands

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use statrs::distribution::ContinuousCDF;

use crate::stationarity::standard_normal;

/// How prediction intervals are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum IntervalMethod {
    /// Normal bands from the model's ψ-weight standard errors
    #[default]
    Analytic,
    /// Empirical quantiles of simulated paths with resampled residuals
    Bootstrap,
    /// Normal bands from the residual spread, widened by √h
    Residual,
}

/// Point forecast with a symmetric or empirical confidence band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastWithConfidence {
    /// Point forecast
    pub forecast: Vec<f64>,
    /// Lower bound of confidence interval
    pub lower: Vec<f64>,
    /// Upper bound of confidence interval
    pub upper: Vec<f64>,
    /// Confidence level (e.g., 0.95 for 95%)
    pub confidence_level: f64,
}

impl ForecastWithConfidence {
    /// Create from point forecast and standard errors
    pub fn from_standard_errors(
        forecast: Vec<f64>,
        std_errors: &[f64],
        confidence_level: f64,
    ) -> Self {
        let z = standard_normal().inverse_cdf(1.0 - (1.0 - confidence_level) / 2.0);

        let lower = forecast
            .iter()
            .zip(std_errors.iter())
            .map(|(&f, &se)| f - z * se)
            .collect();

        let upper = forecast
            .iter()
            .zip(std_errors.iter())
            .map(|(&f, &se)| f + z * se)
            .collect();

        Self {
            forecast,
            lower,
            upper,
            confidence_level,
        }
    }

    /// Band from the sample standard deviation of in-sample residuals
    ///
    /// The spread at horizon h is scaled by √h. Fewer than two residuals
    /// give a zero-width band.
    pub fn from_residuals(forecast: Vec<f64>, residuals: &[f64], confidence_level: f64) -> Self {
        let spread = if residuals.len() < 2 {
            0.0
        } else {
            let n = residuals.len() as f64;
            let mean = residuals.iter().sum::<f64>() / n;
            (residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        };

        let std_errors: Vec<f64> = (1..=forecast.len())
            .map(|h| spread * (h as f64).sqrt())
            .collect();

        Self::from_standard_errors(forecast, &std_errors, confidence_level)
    }

    pub fn len(&self) -> usize {
        self.forecast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forecast.is_empty()
    }

    /// Clamp the band and forecast at zero; customer counts cannot be negative
    pub fn clamp_non_negative(mut self) -> Self {
        for values in [&mut self.forecast, &mut self.lower, &mut self.upper] {
            for v in values.iter_mut() {
                *v = v.max(0.0);
            }
        }
        self
    }
}

/// Calculate prediction intervals from simulated paths
///
/// The point forecast is the mean path; bounds are the empirical
/// `(1 - level) / 2` and `(1 + level) / 2` quantiles per step.
pub fn bootstrap_prediction_interval(
    paths: &[Vec<f64>],
    confidence_level: f64,
) -> ForecastWithConfidence {
    if paths.is_empty() {
        return ForecastWithConfidence {
            forecast: vec![],
            lower: vec![],
            upper: vec![],
            confidence_level,
        };
    }

    let n_steps = paths.iter().map(Vec::len).min().unwrap_or(0);
    let n_samples = paths.len();

    let alpha = 1.0 - confidence_level;
    // Nudge by an epsilon so levels like 0.9 do not land one rank off
    let lower_idx = ((alpha / 2.0) * n_samples as f64 + 1e-9).floor() as usize;
    let upper_idx =
        (((1.0 - alpha / 2.0) * n_samples as f64 - 1e-9).ceil() as usize).min(n_samples - 1);

    let mut forecast = Vec::with_capacity(n_steps);
    let mut lower = Vec::with_capacity(n_steps);
    let mut upper = Vec::with_capacity(n_steps);

    for step in 0..n_steps {
        let mut values: Vec<f64> = paths.iter().map(|p| p[step]).collect();
        values.sort_by(|a, b| a.total_cmp(b));

        forecast.push(values.iter().sum::<f64>() / n_samples as f64);
        lower.push(values[lower_idx.min(n_samples - 1)]);
        upper.push(values[upper_idx]);
    }

    ForecastWithConfidence {
        forecast,
        lower,
        upper,
        confidence_level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_standard_errors() {
        let forecast = vec![10.0, 11.0, 12.0];
        let std_errors = vec![1.0, 1.5, 2.0];

        let result = ForecastWithConfidence::from_standard_errors(forecast, &std_errors, 0.95);

        assert_eq!(result.len(), 3);
        assert!((result.upper[0] - 11.96).abs() < 1e-2);
        assert!((result.lower[0] - 8.04).abs() < 1e-2);
        for ((l, f), u) in result.lower.iter().zip(&result.forecast).zip(&result.upper) {
            assert!(l < f && f < u);
        }
    }

    #[test]
    fn test_wider_level_gives_wider_band() {
        let narrow = ForecastWithConfidence::from_standard_errors(vec![5.0], &[1.0], 0.80);
        let wide = ForecastWithConfidence::from_standard_errors(vec![5.0], &[1.0], 0.99);
        assert!(wide.upper[0] - wide.lower[0] > narrow.upper[0] - narrow.lower[0]);
    }

    #[test]
    fn test_from_residuals_widens_with_horizon() {
        let forecast = vec![10.0, 11.0, 12.0];
        let residuals = vec![0.1, -0.2, 0.15, -0.1, 0.05, -0.15, 0.2, -0.05];

        let result = ForecastWithConfidence::from_residuals(forecast, &residuals, 0.95);

        let width1 = result.upper[0] - result.lower[0];
        let width2 = result.upper[1] - result.lower[1];
        let width3 = result.upper[2] - result.lower[2];
        assert!(width2 > width1);
        assert!(width3 > width2);
    }

    #[test]
    fn test_from_residuals_uses_sample_spread() {
        // Sample standard deviation of [-1, 1] is √2
        let band = ForecastWithConfidence::from_residuals(vec![0.0, 0.0], &[-1.0, 1.0], 0.95);
        let z = 1.959964;
        assert!((band.upper[0] - z * 2f64.sqrt()).abs() < 1e-4);
        assert!((band.upper[1] - z * 2.0).abs() < 1e-4);

        let flat = ForecastWithConfidence::from_residuals(vec![3.0], &[0.5], 0.95);
        assert_eq!(flat.lower, vec![3.0]);
        assert_eq!(flat.upper, vec![3.0]);
    }

    #[test]
    fn test_bootstrap_interval() {
        // 100 paths whose step values are 0..99 shuffled by path index
        let paths: Vec<Vec<f64>> = (0..100)
            .map(|i| vec![i as f64, (99 - i) as f64])
            .collect();

        let result = bootstrap_prediction_interval(&paths, 0.90);
        assert_eq!(result.len(), 2);
        assert!((result.forecast[0] - 49.5).abs() < 1e-10);
        assert_eq!(result.lower[0], 5.0);
        assert_eq!(result.upper[0], 95.0);
        assert_eq!(result.lower[1], 5.0);
    }

    #[test]
    fn test_bootstrap_interval_empty() {
        assert!(bootstrap_prediction_interval(&[], 0.95).is_empty());
    }

    #[test]
    fn test_clamp_non_negative() {
        let band = ForecastWithConfidence {
            forecast: vec![1.0, -0.5],
            lower: vec![-2.0, -3.0],
            upper: vec![4.0, 2.0],
            confidence_level: 0.95,
        }
        .clamp_non_negative();

        assert_eq!(band.forecast, vec![1.0, 0.0]);
        assert_eq!(band.lower, vec![0.0, 0.0]);
        assert_eq!(band.upper, vec![4.0, 2.0]);
    }
}
