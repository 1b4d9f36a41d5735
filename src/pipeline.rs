//! End-to-end patronage forecast: load, aggregate, test, fit, score, forecast

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ForecastConfig;
use crate::correlation::{acf, confidence_bound, default_lags, ljung_box, pacf, LjungBoxResult};
use crate::data::load_transactions;
use crate::error::{PatronageError, Result};
use crate::forecast::{bootstrap_prediction_interval, ForecastWithConfidence, IntervalMethod};
use crate::metrics::MetricsSummary;
use crate::model::{select_order, Arima, ArimaOrder, Predictor};
use crate::series::{weekly_unique_customers, WeekLabel, WeeklyPatronage};
use crate::stationarity::{difference, select_differencing_order, DifferencingChoice};

/// Correlograms of the differenced series
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationSummary {
    pub differencing: usize,
    pub acf: Vec<f64>,
    pub pacf: Vec<f64>,
    /// Half-width of the white-noise band
    pub bound: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FittedModel {
    pub order: ArimaOrder,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub constant: f64,
    pub sigma2: f64,
    pub aic: f64,
}

impl FittedModel {
    fn from_arima(model: &Arima) -> Self {
        Self {
            order: model.order(),
            ar: model.ar_coefficients().to_vec(),
            ma: model.ma_coefficients().to_vec(),
            constant: model.constant(),
            sigma2: model.sigma2(),
            aic: model.aic(),
        }
    }
}

/// Residual checks on the training fit
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub residuals: Vec<f64>,
    pub residual_acf: Vec<f64>,
    pub bound: f64,
    pub ljung_box: LjungBoxResult,
}

/// Forecast of the held-out weeks against what actually happened
#[derive(Debug, Clone, Serialize)]
pub struct HoldoutEvaluation {
    pub train_len: usize,
    pub labels: Vec<WeekLabel>,
    pub actual: Vec<f64>,
    pub forecast: ForecastWithConfidence,
    pub metrics: MetricsSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct FutureForecast {
    pub labels: Vec<WeekLabel>,
    pub forecast: ForecastWithConfidence,
}

/// Everything a run produces
#[derive(Debug, Clone, Serialize)]
pub struct PatronageReport {
    pub series: WeeklyPatronage,
    /// Absent when the ADF test could not run and was not required
    pub stationarity: Option<DifferencingChoice>,
    pub differencing: usize,
    pub correlation: CorrelationSummary,
    pub model: FittedModel,
    pub diagnostics: Diagnostics,
    pub holdout: HoldoutEvaluation,
    pub future: Option<FutureForecast>,
    pub interval: IntervalMethod,
}

/// Load the configured CSV and run the full analysis
pub fn run(config: &ForecastConfig) -> Result<PatronageReport> {
    config.validate()?;

    let transactions = load_transactions(&config.input)?;
    let series = weekly_unique_customers(&transactions, config.bucketing);
    if series.is_empty() {
        return Err(PatronageError::EmptyData(config.input.clone()));
    }
    info!(
        weeks = series.len(),
        bucketing = ?config.bucketing,
        "aggregated weekly unique customers"
    );

    analyse(&series, config)
}

/// Run stationarity checks, fit, score and forecast an aggregated series
pub fn analyse(series: &WeeklyPatronage, config: &ForecastConfig) -> Result<PatronageReport> {
    config.validate()?;
    let values = series.values();

    let stationarity = match select_differencing_order(values, config.significance) {
        Ok(choice) => {
            info!(
                recommended = choice.order,
                p_value = choice.tests[0].p_value,
                "stationarity check"
            );
            Some(choice)
        }
        Err(e) if !config.auto_differencing => {
            warn!(error = %e, "stationarity check skipped");
            None
        }
        Err(e) => return Err(e),
    };

    let d = match (&stationarity, config.auto_differencing) {
        (Some(choice), true) => choice.order,
        _ => config.order.d,
    };

    let smallest = if config.auto_order.is_some() {
        ArimaOrder::new(0, d, 0)
    } else {
        ArimaOrder::new(config.order.p, d, config.order.q)
    };
    let required = config.holdout_weeks + smallest.min_observations();
    if values.len() < required {
        return Err(PatronageError::InsufficientData {
            required,
            actual: values.len(),
        });
    }

    let differenced = difference(values, d);
    let nlags = default_lags(differenced.len());
    let correlation = CorrelationSummary {
        differencing: d,
        acf: acf(&differenced, nlags),
        pacf: pacf(&differenced, nlags),
        bound: confidence_bound(differenced.len(), config.confidence),
    };
    debug!(nlags, bound = correlation.bound, "correlograms");

    let (train, test) = series.split(config.holdout_weeks);
    let model = fit_model(train, d, config)?;
    let order = model.order();
    info!(
        %order,
        train_weeks = train.len(),
        aic = model.aic(),
        "fitted model on training weeks"
    );

    let residuals = model.residuals().to_vec();
    let residual_lags = default_lags(residuals.len()).max(1);
    let diagnostics = Diagnostics {
        residual_acf: acf(&residuals, residual_lags),
        bound: confidence_bound(residuals.len(), config.confidence),
        ljung_box: ljung_box(&residuals, residual_lags),
        residuals,
    };
    if diagnostics.ljung_box.is_significant {
        warn!(
            p_value = diagnostics.ljung_box.p_value,
            "residuals retain autocorrelation"
        );
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let holdout_band = forecast_band(&model, test.len(), config, &mut rng)?;
    let metrics = MetricsSummary::compute(test, &holdout_band.forecast);
    info!(
        mape = metrics.mape,
        rmse = metrics.rmse,
        "scored hold-out forecast"
    );

    let holdout = HoldoutEvaluation {
        train_len: train.len(),
        labels: series.labels[train.len()..].to_vec(),
        actual: test.to_vec(),
        forecast: holdout_band,
        metrics,
    };

    let future = if config.horizon > 0 {
        let mut full = Arima::from_order(order)?;
        full.fit(values)?;
        let band = forecast_band(&full, config.horizon, config, &mut rng)?;
        info!(horizon = config.horizon, "forecast future weeks");
        Some(FutureForecast {
            labels: series.future_labels(config.horizon),
            forecast: band,
        })
    } else {
        None
    };

    Ok(PatronageReport {
        series: series.clone(),
        stationarity,
        differencing: d,
        correlation,
        model: FittedModel::from_arima(&model),
        diagnostics,
        holdout,
        future,
        interval: config.interval,
    })
}

fn fit_model(train: &[f64], d: usize, config: &ForecastConfig) -> Result<Arima> {
    match config.auto_order {
        Some(search) => select_order(train, d, search.max_p, search.max_q),
        None => {
            let mut model = Arima::new(config.order.p, d, config.order.q)?;
            model.fit(train)?;
            Ok(model)
        }
    }
}

fn forecast_band(
    model: &Arima,
    steps: usize,
    config: &ForecastConfig,
    rng: &mut StdRng,
) -> Result<ForecastWithConfidence> {
    let band = match config.interval {
        IntervalMethod::Analytic => model.forecast(steps, config.confidence)?,
        IntervalMethod::Bootstrap => {
            let paths = model.bootstrap_paths(steps, config.bootstrap_paths, rng)?;
            bootstrap_prediction_interval(&paths, config.confidence)
        }
        IntervalMethod::Residual => ForecastWithConfidence::from_residuals(
            model.predict(steps)?,
            model.residuals(),
            config.confidence,
        ),
    };
    Ok(band.clamp_non_negative())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrderSearch;
    use rand::Rng;

    fn weekly(values: Vec<f64>) -> WeeklyPatronage {
        let mut label = WeekLabel::calendar(2010, 48);
        let labels = values
            .iter()
            .map(|_| {
                let current = label;
                label = label.next();
                current
            })
            .collect();
        WeeklyPatronage {
            labels,
            customers: values,
        }
    }

    fn noisy_level(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut value: f64 = 0.0;
        (0..n)
            .map(|_| {
                value = 0.5 * value + rng.gen_range(-10.0..10.0);
                (150.0 + value).round()
            })
            .collect()
    }

    #[test]
    fn test_analyse_default_config() {
        let series = weekly(noisy_level(60, 1));
        let report = analyse(&series, &ForecastConfig::default()).unwrap();

        assert_eq!(report.differencing, 1);
        assert_eq!(report.model.order, ArimaOrder::new(1, 1, 1));
        assert_eq!(report.holdout.train_len, 56);
        assert_eq!(report.holdout.actual, series.customers[56..].to_vec());
        assert_eq!(report.holdout.labels, series.labels[56..].to_vec());
        assert_eq!(report.holdout.forecast.len(), 4);
        assert!(report.holdout.metrics.mape.is_finite());

        let future = report.future.unwrap();
        assert_eq!(future.labels.len(), 12);
        assert_eq!(future.labels[0], series.labels[59].next());
        assert!(future.forecast.lower.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_auto_differencing_uses_adf_recommendation() {
        let series = weekly(noisy_level(80, 2));
        let config = ForecastConfig {
            auto_differencing: true,
            ..Default::default()
        };
        let report = analyse(&series, &config).unwrap();

        let choice = report.stationarity.unwrap();
        assert_eq!(report.differencing, choice.order);
        assert_eq!(report.model.order.d, choice.order);
        assert_eq!(report.correlation.differencing, choice.order);
    }

    #[test]
    fn test_auto_order_search() {
        let series = weekly(noisy_level(70, 3));
        let config = ForecastConfig {
            auto_order: Some(OrderSearch { max_p: 2, max_q: 1 }),
            horizon: 0,
            ..Default::default()
        };
        let report = analyse(&series, &config).unwrap();

        assert!(report.model.order.p <= 2);
        assert!(report.model.order.q <= 1);
        assert!(report.future.is_none());
    }

    #[test]
    fn test_bootstrap_interval_is_reproducible() {
        let series = weekly(noisy_level(60, 4));
        let config = ForecastConfig {
            interval: IntervalMethod::Bootstrap,
            bootstrap_paths: 200,
            ..Default::default()
        };
        let first = analyse(&series, &config).unwrap();
        let second = analyse(&series, &config).unwrap();

        assert_eq!(first.holdout.forecast, second.holdout.forecast);
        let band = &first.holdout.forecast;
        for i in 0..band.len() {
            assert!(band.lower[i] <= band.upper[i]);
        }
    }

    #[test]
    fn test_residual_interval_widens_with_horizon() {
        let series = weekly(noisy_level(60, 6));
        let config = ForecastConfig {
            interval: IntervalMethod::Residual,
            ..Default::default()
        };
        let report = analyse(&series, &config).unwrap();

        assert_eq!(report.interval, IntervalMethod::Residual);
        let band = &report.future.unwrap().forecast;
        assert_eq!(band.len(), 12);
        assert!(band.upper[11] - band.lower[11] > band.upper[0] - band.lower[0]);
    }

    #[test]
    fn test_too_few_weeks() {
        let series = weekly(noisy_level(12, 5));
        let result = analyse(&series, &ForecastConfig::default());
        assert!(matches!(
            result,
            Err(PatronageError::InsufficientData { required: 17, actual: 12 })
        ));
    }

    #[test]
    fn test_run_rejects_invalid_config() {
        let config = ForecastConfig {
            holdout_weeks: 0,
            ..Default::default()
        };
        assert!(matches!(
            run(&config),
            Err(PatronageError::InvalidParameter { .. })
        ));
    }
}
