//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::config::{ForecastConfig, OrderSearch, DEFAULT_FIGURES_DIR, DEFAULT_INPUT};
use crate::error::Result;
use crate::forecast::IntervalMethod;
use crate::model::ArimaOrder;
use crate::series::WeekBucketing;

/// Forecast weekly customer patronage with ARIMA
///
/// Every option can also be set through a PATRONAGE_* environment variable
/// or a .env file in the working directory.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the processed transactions CSV
    #[arg(short, long, env = "PATRONAGE_INPUT", default_value = DEFAULT_INPUT)]
    pub input: PathBuf,

    /// Directory for the PNG figures
    #[arg(long, env = "PATRONAGE_FIGURES_DIR", default_value = DEFAULT_FIGURES_DIR)]
    pub figures_dir: PathBuf,

    /// Also write the full report as JSON to this path
    #[arg(long, env = "PATRONAGE_JSON")]
    pub json: Option<PathBuf>,

    /// Trailing weeks held out to score the model
    #[arg(long, env = "PATRONAGE_HOLDOUT_WEEKS", default_value = "4")]
    pub holdout: usize,

    /// ARIMA order as "p,d,q"
    #[arg(short, long, env = "PATRONAGE_ORDER", default_value = "1,1,1")]
    pub order: String,

    /// Use the ADF-recommended differencing order instead of d from --order
    #[arg(long, env = "PATRONAGE_AUTO_DIFFERENCING")]
    pub auto_differencing: bool,

    /// Choose p and q by AIC instead of taking them from --order
    #[arg(long, env = "PATRONAGE_AUTO_ORDER")]
    pub auto_order: bool,

    /// Largest AR order tried by --auto-order
    #[arg(long, env = "PATRONAGE_MAX_P", default_value = "3")]
    pub max_p: usize,

    /// Largest MA order tried by --auto-order
    #[arg(long, env = "PATRONAGE_MAX_Q", default_value = "3")]
    pub max_q: usize,

    /// Future weeks to forecast after refitting on all data (0 disables)
    #[arg(long, env = "PATRONAGE_HORIZON", default_value = "12")]
    pub horizon: usize,

    /// Confidence level of the prediction intervals
    #[arg(long, env = "PATRONAGE_CONFIDENCE", default_value = "0.95")]
    pub confidence: f64,

    /// Significance level of the ADF test
    #[arg(long, env = "PATRONAGE_SIGNIFICANCE", default_value = "0.05")]
    pub significance: f64,

    /// Weekly bucketing. The default keeps years apart and zero-fills empty
    /// weeks; week-of-year folds years onto ISO week numbers like the
    /// original isocalendar().week grouping
    #[arg(long, value_enum, env = "PATRONAGE_BUCKETING", default_value = "calendar")]
    pub bucketing: WeekBucketing,

    /// How prediction intervals are computed
    #[arg(long, value_enum, env = "PATRONAGE_INTERVAL", default_value = "analytic")]
    pub interval: IntervalMethod,

    /// Simulated paths for bootstrap intervals
    #[arg(long, env = "PATRONAGE_BOOTSTRAP_PATHS", default_value = "1000")]
    pub bootstrap_paths: usize,

    /// Random seed for bootstrap resampling
    #[arg(long, env = "PATRONAGE_SEED", default_value = "42")]
    pub seed: u64,

    /// Skip rendering figures
    #[arg(long, env = "PATRONAGE_NO_FIGURES")]
    pub no_figures: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse the ARIMA order from the order string
    /// Expected format: "p,d,q"
    pub fn parse_order(&self) -> Result<ArimaOrder> {
        self.order.parse()
    }

    /// Build and validate the run configuration
    pub fn to_config(&self) -> Result<ForecastConfig> {
        let config = ForecastConfig {
            input: self.input.clone(),
            figures_dir: self.figures_dir.clone(),
            json_output: self.json.clone(),
            holdout_weeks: self.holdout,
            order: self.parse_order()?,
            auto_differencing: self.auto_differencing,
            auto_order: self.auto_order.then_some(OrderSearch {
                max_p: self.max_p,
                max_q: self.max_q,
            }),
            horizon: self.horizon,
            confidence: self.confidence,
            significance: self.significance,
            bucketing: self.bucketing,
            interval: self.interval,
            bootstrap_paths: self.bootstrap_paths,
            seed: self.seed,
            render_figures: !self.no_figures,
        };
        config.validate()?;
        Ok(config)
    }
}
