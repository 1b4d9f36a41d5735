//! Patronage: weekly customer patronage forecasting for retail transactions
//!
//! This library turns processed transaction data into a weekly series of
//! unique customers, checks it for stationarity and forecasts it with an
//! ARIMA model, scoring the fit on a hold-out of the most recent weeks.

pub mod cli;
pub mod config;
pub mod correlation;
pub mod data;
pub mod error;
pub mod forecast;
pub mod metrics;
pub mod model;
pub mod pipeline;
mod regression;
pub mod report;
pub mod series;
pub mod stationarity;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{ForecastConfig, OrderSearch};
pub use data::{load_transactions, Transaction};
pub use error::{PatronageError, Result};
pub use forecast::{ForecastWithConfidence, IntervalMethod};
pub use metrics::MetricsSummary;
pub use model::{select_order, Arima, ArimaOrder, Predictor};
pub use pipeline::{analyse, run, PatronageReport};
pub use report::{print_report, write_json};
pub use series::{weekly_unique_customers, WeekBucketing, WeekLabel, WeeklyPatronage};
pub use stationarity::{adf_test, select_differencing_order, AdfResult};
