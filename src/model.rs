//! ARIMA model for weekly patronage
//!
//! The model combines three components:
//!
//! - **AR (AutoRegressive)**: past values of the differenced series
//! - **I (Integrated)**: `d` rounds of differencing to reach stationarity
//! - **MA (Moving Average)**: past one-step forecast errors
//!
//! Coefficients are estimated with the Hannan-Rissanen procedure: a long
//! autoregression supplies proxy innovations, then the ARMA equation is
//! solved by least squares on lagged values and lagged proxies. A constant
//! is included only when the series is not differenced.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PatronageError, Result};
use crate::forecast::ForecastWithConfidence;
use crate::regression::least_squares;
use crate::stationarity::difference;

/// Bound applied to every estimated coefficient to keep the recursion stable
const COEFFICIENT_BOUND: f64 = 0.99;

/// Common fit/predict interface for patronage models
pub trait Predictor {
    /// Fit the model to historical data
    fn fit(&mut self, data: &[f64]) -> Result<()>;

    /// Predict future values
    fn predict(&self, steps: usize) -> Result<Vec<f64>>;

    /// Check if the model has been fitted
    fn is_fitted(&self) -> bool;
}

/// ARIMA (p, d, q) orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub const MAX_AR: usize = 10;
    pub const MAX_DIFFERENCING: usize = 2;
    pub const MAX_MA: usize = 10;

    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    pub fn validate(&self) -> Result<()> {
        if self.p > Self::MAX_AR {
            return Err(PatronageError::invalid_parameter("p", "AR order must be <= 10"));
        }
        if self.d > Self::MAX_DIFFERENCING {
            return Err(PatronageError::invalid_parameter(
                "d",
                "Differencing order must be <= 2",
            ));
        }
        if self.q > Self::MAX_MA {
            return Err(PatronageError::invalid_parameter("q", "MA order must be <= 10"));
        }
        Ok(())
    }

    /// Smallest series length accepted by `fit`
    pub fn min_observations(&self) -> usize {
        self.p + self.d + self.q + 10
    }
}

impl Default for ArimaOrder {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.p, self.d, self.q)
    }
}

impl FromStr for ArimaOrder {
    type Err = PatronageError;

    /// Parse `"p,d,q"`, optionally wrapped in parentheses
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('(').trim_end_matches(')');
        let parts: Vec<&str> = trimmed.split(',').collect();
        if parts.len() != 3 {
            return Err(PatronageError::invalid_parameter(
                "order",
                format!("expected 'p,d,q', got '{}'", s),
            ));
        }

        let mut values = [0usize; 3];
        for (slot, (name, part)) in values.iter_mut().zip(["p", "d", "q"].iter().zip(&parts)) {
            *slot = part.trim().parse().map_err(|_| {
                PatronageError::invalid_parameter(name, format!("'{}' is not a whole number", part.trim()))
            })?;
        }

        let order = Self::new(values[0], values[1], values[2]);
        order.validate()?;
        Ok(order)
    }
}

/// ARIMA model for time series forecasting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arima {
    order: ArimaOrder,
    include_constant: bool,
    /// First differenced observation counted in the AIC
    score_start: usize,
    ar_coeffs: Vec<f64>,
    ma_coeffs: Vec<f64>,
    constant: f64,
    /// Innovation variance
    sigma2: f64,
    aic: f64,
    /// Series after `d` differences
    differenced: Vec<f64>,
    /// Conditional residuals on the differenced scale
    residuals: Vec<f64>,
    /// Last value of the series differenced k times, for k in 0..d
    level_tails: Vec<f64>,
    fitted: bool,
}

impl Arima {
    /// Create a new, unfitted ARIMA model
    ///
    /// # Arguments
    ///
    /// * `p` - Order of autoregressive component (0-10)
    /// * `d` - Degree of differencing (0-2)
    /// * `q` - Order of moving average component (0-10)
    pub fn new(p: usize, d: usize, q: usize) -> Result<Self> {
        Self::from_order(ArimaOrder::new(p, d, q))
    }

    pub fn from_order(order: ArimaOrder) -> Result<Self> {
        order.validate()?;
        Ok(Self {
            order,
            include_constant: order.d == 0,
            score_start: 0,
            ar_coeffs: vec![0.0; order.p],
            ma_coeffs: vec![0.0; order.q],
            constant: 0.0,
            sigma2: f64::NAN,
            aic: f64::NAN,
            differenced: Vec::new(),
            residuals: Vec::new(),
            level_tails: Vec::new(),
            fitted: false,
        })
    }

    /// Score the AIC only on differenced observations from `start` on
    ///
    /// Candidates compared by AIC must share this start; otherwise higher
    /// AR orders are scored on fewer observations.
    pub fn with_score_start(mut self, start: usize) -> Self {
        self.score_start = start;
        self
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar_coeffs
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma_coeffs
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// Akaike information criterion of the conditional fit
    pub fn aic(&self) -> f64 {
        self.aic
    }

    /// Residuals after the AR burn-in, on the differenced scale
    pub fn residuals(&self) -> &[f64] {
        let start = self.order.p.min(self.residuals.len());
        &self.residuals[start..]
    }

    fn estimate(&self, w: &[f64]) -> Result<(Vec<f64>, Vec<f64>, f64)> {
        let ArimaOrder { p, q, .. } = self.order;
        let m = w.len();

        if q == 0 {
            if p == 0 {
                let constant = if self.include_constant {
                    w.iter().sum::<f64>() / m as f64
                } else {
                    0.0
                };
                return Ok((Vec::new(), Vec::new(), constant));
            }
            let rows: Vec<Vec<f64>> = (p..m)
                .map(|t| (1..=p).map(|i| w[t - i]).collect())
                .collect();
            let fit = least_squares(&rows, &w[p..], self.include_constant)?;
            return Ok((fit.coefficients, Vec::new(), fit.intercept));
        }

        // Long AR order: ln(m) but at least p + q, capped so stage two stays estimable
        let preferred = ((m as f64).ln().ceil() as usize).max(p + q).max(1);
        let cap = m.saturating_sub(q + 2 * (p + q) + 3);
        let long = preferred.min(cap);
        if long == 0 || long < p {
            return Err(PatronageError::InsufficientData {
                required: self.order.min_observations() + preferred,
                actual: m + self.order.d,
            });
        }

        let rows: Vec<Vec<f64>> = (long..m)
            .map(|t| (1..=long).map(|i| w[t - i]).collect())
            .collect();
        let stage_one = least_squares(&rows, &w[long..], true)?;
        let mut innovations = vec![0.0; m];
        innovations[long..].copy_from_slice(&stage_one.residuals);

        let start = long + q;
        let rows: Vec<Vec<f64>> = (start..m)
            .map(|t| {
                (1..=p)
                    .map(|i| w[t - i])
                    .chain((1..=q).map(|j| innovations[t - j]))
                    .collect()
            })
            .collect();
        let stage_two = least_squares(&rows, &w[start..], self.include_constant)?;

        let (ar, ma) = stage_two.coefficients.split_at(p);
        Ok((ar.to_vec(), ma.to_vec(), stage_two.intercept))
    }

    /// One-step prediction at position `t` of the extended series
    fn step(&self, w: &[f64], e: &[f64], t: usize) -> f64 {
        let mut prediction = self.constant;
        for (i, phi) in self.ar_coeffs.iter().enumerate() {
            if t > i {
                prediction += phi * w[t - i - 1];
            }
        }
        for (j, theta) in self.ma_coeffs.iter().enumerate() {
            if t > j {
                prediction += theta * e[t - j - 1];
            }
        }
        prediction
    }

    /// Undo the differencing, starting from the last observed level
    fn integrate(&self, values: &[f64]) -> Vec<f64> {
        let mut result = values.to_vec();
        for tail in self.level_tails.iter().rev() {
            let mut last = *tail;
            for v in result.iter_mut() {
                last += *v;
                *v = last;
            }
        }
        result
    }

    /// MA(∞) weights ψ_0..ψ_{h-1} of the integrated model
    pub fn psi_weights(&self, h: usize) -> Vec<f64> {
        if h == 0 {
            return Vec::new();
        }

        // φ*(B) = φ(B)·(1 - B)^d, stored as polynomial coefficients
        let mut poly = vec![1.0];
        poly.extend(self.ar_coeffs.iter().map(|a| -a));
        for _ in 0..self.order.d {
            let mut next = vec![0.0; poly.len() + 1];
            for (i, c) in poly.iter().enumerate() {
                next[i] += c;
                next[i + 1] -= c;
            }
            poly = next;
        }
        let phi_star: Vec<f64> = poly[1..].iter().map(|c| -c).collect();

        let mut psi = vec![0.0; h];
        psi[0] = 1.0;
        for j in 1..h {
            let mut value = self.ma_coeffs.get(j - 1).copied().unwrap_or(0.0);
            for i in 1..=j.min(phi_star.len()) {
                value += phi_star[i - 1] * psi[j - i];
            }
            psi[j] = value;
        }
        psi
    }

    /// Forecast standard errors for horizons 1..=steps
    pub fn standard_errors(&self, steps: usize) -> Result<Vec<f64>> {
        if !self.fitted {
            return Err(PatronageError::NotFitted);
        }
        let mut cumulative = 0.0;
        Ok(self
            .psi_weights(steps)
            .iter()
            .map(|psi| {
                cumulative += psi * psi;
                (self.sigma2 * cumulative).sqrt()
            })
            .collect())
    }

    /// Point forecast with normal prediction intervals
    pub fn forecast(&self, steps: usize, confidence_level: f64) -> Result<ForecastWithConfidence> {
        let point = self.predict(steps)?;
        let std_errors = self.standard_errors(steps)?;
        Ok(ForecastWithConfidence::from_standard_errors(
            point,
            &std_errors,
            confidence_level,
        ))
    }

    /// Simulate future paths by resampling fitted residuals
    pub fn bootstrap_paths<R: Rng + ?Sized>(
        &self,
        steps: usize,
        n_paths: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<f64>>> {
        if !self.fitted {
            return Err(PatronageError::NotFitted);
        }
        let pool = self.residuals();
        if pool.is_empty() {
            return Err(PatronageError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }

        let m = self.differenced.len();
        let mut paths = Vec::with_capacity(n_paths);
        for _ in 0..n_paths {
            let mut w = self.differenced.clone();
            let mut e = self.residuals.clone();
            for _ in 0..steps {
                let t = w.len();
                let shock = pool[rng.gen_range(0..pool.len())];
                w.push(self.step(&w, &e, t) + shock);
                e.push(shock);
            }
            paths.push(self.integrate(&w[m..]));
        }
        Ok(paths)
    }
}

impl Predictor for Arima {
    fn fit(&mut self, data: &[f64]) -> Result<()> {
        let required = self.order.min_observations();
        if data.len() < required {
            return Err(PatronageError::InsufficientData {
                required,
                actual: data.len(),
            });
        }
        if data.iter().any(|x| !x.is_finite()) {
            return Err(PatronageError::InvalidData(
                "Data contains NaN or infinite values".to_string(),
            ));
        }

        let mut level_tails = Vec::with_capacity(self.order.d);
        let mut current = data.to_vec();
        for _ in 0..self.order.d {
            level_tails.push(current[current.len() - 1]);
            current = difference(&current, 1);
        }
        self.level_tails = level_tails;
        self.differenced = current;

        let (ar, ma, constant) = self.estimate(&self.differenced)?;
        self.ar_coeffs = ar
            .into_iter()
            .map(|c| c.clamp(-COEFFICIENT_BOUND, COEFFICIENT_BOUND))
            .collect();
        self.ma_coeffs = ma
            .into_iter()
            .map(|c| c.clamp(-COEFFICIENT_BOUND, COEFFICIENT_BOUND))
            .collect();
        self.constant = constant;

        let m = self.differenced.len();
        let p = self.order.p;
        let mut residuals = vec![0.0; m];
        for t in p..m {
            let prediction = self.step(&self.differenced, &residuals, t);
            residuals[t] = self.differenced[t] - prediction;
        }
        self.residuals = residuals;

        let effective = (m - p) as f64;
        let sse: f64 = self.residuals[p..].iter().map(|e| e * e).sum();
        self.sigma2 = (sse / effective).max(1e-12);

        let from = p.max(self.score_start);
        if from >= m {
            return Err(PatronageError::InsufficientData {
                required: from + self.order.d + 1,
                actual: data.len(),
            });
        }
        let scored = (m - from) as f64;
        let scored_sse: f64 = self.residuals[from..].iter().map(|e| e * e).sum();
        let n_params = self.order.p + self.order.q + usize::from(self.include_constant) + 1;
        self.aic = scored * (scored_sse / scored).max(1e-12).ln() + 2.0 * n_params as f64;
        self.fitted = true;

        debug!(
            order = %self.order,
            ar = ?self.ar_coeffs,
            ma = ?self.ma_coeffs,
            constant = self.constant,
            sigma2 = self.sigma2,
            aic = self.aic,
            "fitted ARIMA"
        );
        Ok(())
    }

    fn predict(&self, steps: usize) -> Result<Vec<f64>> {
        if !self.fitted {
            return Err(PatronageError::NotFitted);
        }

        if steps == 0 {
            return Ok(Vec::new());
        }

        let m = self.differenced.len();
        let mut w = self.differenced.clone();
        let mut e = self.residuals.clone();
        for _ in 0..steps {
            let t = w.len();
            w.push(self.step(&w, &e, t));
            e.push(0.0);
        }

        Ok(self.integrate(&w[m..]))
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }
}

/// Fit every (p, d, q) with p <= max_p and q <= max_q and keep the lowest AIC
///
/// Every candidate is scored on the differenced observations from
/// `max_p + max_q` on.
pub fn select_order(data: &[f64], d: usize, max_p: usize, max_q: usize) -> Result<Arima> {
    let score_start = max_p + max_q;
    let mut best: Option<Arima> = None;
    for p in 0..=max_p {
        for q in 0..=max_q {
            let mut candidate = Arima::new(p, d, q)?.with_score_start(score_start);
            if let Err(e) = candidate.fit(data) {
                debug!(order = %candidate.order(), error = %e, "skipping candidate order");
                continue;
            }
            if best.as_ref().map_or(true, |b| candidate.aic() < b.aic()) {
                best = Some(candidate);
            }
        }
    }
    best.ok_or_else(|| {
        PatronageError::Numerical(format!(
            "no ARIMA order up to ({},{},{}) could be fitted",
            max_p, d, max_q
        ))
    })
}
