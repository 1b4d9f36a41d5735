//! Run configuration for a patronage forecast

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{PatronageError, Result};
use crate::forecast::IntervalMethod;
use crate::model::ArimaOrder;
use crate::series::WeekBucketing;

pub const DEFAULT_INPUT: &str = "data/processed/cleaned-data.csv";
pub const DEFAULT_FIGURES_DIR: &str = "figures/customer-patronage-forecast";

/// Bounds for the AIC order search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSearch {
    pub max_p: usize,
    pub max_q: usize,
}

impl Default for OrderSearch {
    fn default() -> Self {
        Self { max_p: 3, max_q: 3 }
    }
}

/// Everything a forecast run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Processed transactions CSV
    pub input: PathBuf,
    pub figures_dir: PathBuf,
    /// Optional JSON report destination
    pub json_output: Option<PathBuf>,
    /// Trailing weeks held out for scoring
    pub holdout_weeks: usize,
    pub order: ArimaOrder,
    /// Replace `order.d` with the ADF recommendation
    pub auto_differencing: bool,
    /// Replace `order.p` and `order.q` with an AIC search
    pub auto_order: Option<OrderSearch>,
    /// Future weeks forecast after refitting on the full series
    pub horizon: usize,
    pub confidence: f64,
    /// ADF significance level
    pub significance: f64,
    pub bucketing: WeekBucketing,
    pub interval: IntervalMethod,
    pub bootstrap_paths: usize,
    pub seed: u64,
    pub render_figures: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            figures_dir: PathBuf::from(DEFAULT_FIGURES_DIR),
            json_output: None,
            holdout_weeks: 4,
            order: ArimaOrder::default(),
            auto_differencing: false,
            auto_order: None,
            horizon: 12,
            confidence: 0.95,
            significance: 0.05,
            bucketing: WeekBucketing::default(),
            interval: IntervalMethod::default(),
            bootstrap_paths: 1000,
            seed: 42,
            render_figures: true,
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(PatronageError::invalid_parameter(
                "confidence",
                format!("must lie strictly between 0 and 1, got {}", self.confidence),
            ));
        }
        if !(self.significance > 0.0 && self.significance < 1.0) {
            return Err(PatronageError::invalid_parameter(
                "significance",
                format!("must lie strictly between 0 and 1, got {}", self.significance),
            ));
        }
        if self.holdout_weeks == 0 {
            return Err(PatronageError::invalid_parameter(
                "holdout_weeks",
                "at least one week must be held out",
            ));
        }
        if self.bootstrap_paths == 0 {
            return Err(PatronageError::invalid_parameter(
                "bootstrap_paths",
                "must be positive",
            ));
        }
        self.order.validate()?;
        if let Some(search) = self.auto_order {
            ArimaOrder::new(search.max_p, self.order.d, search.max_q).validate()?;
        }
        Ok(())
    }
}
