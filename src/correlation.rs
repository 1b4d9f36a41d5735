//! Autocorrelation analysis used for order identification and residual checks

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::stationarity::standard_normal;

/// Autocorrelation function for lags 0..=nlags
pub fn acf(data: &[f64], nlags: usize) -> Vec<f64> {
    let n = data.len();
    if n < 2 {
        return Vec::new();
    }

    let nlags = nlags.min(n - 1);
    let mean = data.iter().sum::<f64>() / n as f64;
    let denom: f64 = data.iter().map(|x| (x - mean).powi(2)).sum();

    if denom < 1e-12 {
        return vec![1.0; nlags + 1];
    }

    (0..=nlags)
        .map(|lag| {
            if lag == 0 {
                return 1.0;
            }
            data[lag..]
                .iter()
                .zip(data[..n - lag].iter())
                .map(|(a, b)| (a - mean) * (b - mean))
                .sum::<f64>()
                / denom
        })
        .collect()
}

/// Partial autocorrelation function for lags 0..=nlags (Durbin-Levinson)
pub fn pacf(data: &[f64], nlags: usize) -> Vec<f64> {
    let rho = acf(data, nlags);
    if rho.is_empty() {
        return Vec::new();
    }

    let nlags = rho.len() - 1;
    let mut result = vec![0.0; nlags + 1];
    result[0] = 1.0;
    if nlags == 0 {
        return result;
    }

    let mut phi = vec![vec![0.0; nlags + 1]; nlags + 1];
    phi[1][1] = rho[1];
    result[1] = rho[1];

    for k in 2..=nlags {
        let mut num = rho[k];
        let mut den = 1.0;
        for j in 1..k {
            num -= phi[k - 1][j] * rho[k - j];
            den -= phi[k - 1][j] * rho[j];
        }
        if den.abs() < 1e-10 {
            break;
        }

        phi[k][k] = num / den;
        result[k] = phi[k][k];
        for j in 1..k {
            phi[k][j] = phi[k - 1][j] - phi[k][k] * phi[k - 1][k - j];
        }
    }

    result
}

/// Number of lags shown in correlograms: min(10·log10(n), n/2 - 1)
pub fn default_lags(n: usize) -> usize {
    if n < 4 {
        return n.saturating_sub(1);
    }
    let by_length = (10.0 * (n as f64).log10()) as usize;
    by_length.min(n / 2 - 1)
}

/// Half-width of the white-noise band for correlograms: z/√n
pub fn confidence_bound(n: usize, level: f64) -> f64 {
    if n == 0 {
        return f64::NAN;
    }
    let z = standard_normal().inverse_cdf(1.0 - (1.0 - level) / 2.0);
    z / (n as f64).sqrt()
}

/// Ljung-Box portmanteau test outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LjungBoxResult {
    pub statistic: f64,
    pub p_value: f64,
    pub lags: usize,
    /// Autocorrelation remains at the 5% level
    pub is_significant: bool,
}

/// Ljung-Box test for remaining autocorrelation
///
/// H0: the first `lags` autocorrelations are all zero.
pub fn ljung_box(data: &[f64], lags: usize) -> LjungBoxResult {
    let n = data.len();
    let rho = acf(data, lags);

    if rho.len() < 2 {
        return LjungBoxResult {
            statistic: f64::NAN,
            p_value: 1.0,
            lags,
            is_significant: false,
        };
    }

    let used = rho.len() - 1;
    let q = rho[1..]
        .iter()
        .enumerate()
        .map(|(k, r)| r * r / (n - (k + 1)) as f64)
        .sum::<f64>()
        * n as f64
        * (n + 2) as f64;

    let p_value = match ChiSquared::new(used as f64) {
        Ok(chi2) => 1.0 - chi2.cdf(q),
        Err(_) => 1.0,
    };

    LjungBoxResult {
        statistic: q,
        p_value,
        lags: used,
        is_significant: p_value < 0.05,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_acf_basics() {
        let data: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let values = acf(&data, 3);

        assert_eq!(values.len(), 4);
        assert_eq!(values[0], 1.0);
        assert!(values[1] < -0.9);
        assert!(values[2] > 0.8);
    }

    #[test]
    fn test_acf_constant_series() {
        assert_eq!(acf(&[5.0; 6], 2), vec![1.0, 1.0, 1.0]);
        assert!(acf(&[1.0], 3).is_empty());
    }

    #[test]
    fn test_pacf_cuts_off_for_ar1() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut data = vec![0.0; 400];
        for t in 1..data.len() {
            data[t] = 0.7 * data[t - 1] + rng.gen_range(-1.0..1.0);
        }
        let values = pacf(&data, 5);

        assert_eq!(values[0], 1.0);
        assert!((values[1] - 0.7).abs() < 0.15);
        for v in &values[2..] {
            assert!(v.abs() < 0.2);
        }
    }

    #[test]
    fn test_default_lags() {
        assert_eq!(default_lags(48), 16);
        assert_eq!(default_lags(20), 9);
        assert_eq!(default_lags(3), 2);
    }

    #[test]
    fn test_confidence_bound() {
        let bound = confidence_bound(100, 0.95);
        assert!((bound - 0.196).abs() < 1e-3);
        assert!(confidence_bound(0, 0.95).is_nan());
    }

    #[test]
    fn test_ljung_box_flags_alternating_series() {
        let data: Vec<f64> = (0..50).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let result = ljung_box(&data, 5);

        assert_eq!(result.lags, 5);
        assert!(result.statistic > 50.0);
        assert!(result.p_value < 0.01);
        assert!(result.is_significant);
    }
}
