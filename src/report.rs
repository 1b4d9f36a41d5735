//! Console and JSON output of a forecast run

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::forecast::ForecastWithConfidence;
use crate::pipeline::PatronageReport;
use crate::series::WeekLabel;

/// Print the report summary to stdout
pub fn print_report(report: &PatronageReport) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    // A closed stdout is not worth failing the run over
    let _ = write_report(&mut out, report);
}

/// Write the human-readable summary to any writer
pub fn write_report<W: Write>(out: &mut W, report: &PatronageReport) -> io::Result<()> {
    let series = &report.series;
    writeln!(out, "=== Customer Patronage Forecast ===\n")?;
    writeln!(out, "Weeks observed: {}", series.len())?;
    if let (Some(first), Some(last)) = (series.labels.first(), series.labels.last()) {
        writeln!(out, "Span: {} to {}", first, last)?;
    }
    let total: f64 = series.customers.iter().sum();
    if !series.is_empty() {
        writeln!(
            out,
            "Mean weekly unique customers: {:.1}",
            total / series.len() as f64
        )?;
    }

    writeln!(out, "\n=== Stationarity (ADF) ===")?;
    match &report.stationarity {
        Some(choice) => {
            for (i, test) in choice.tests.iter().enumerate() {
                let name = if i == 0 { "level" } else { "first difference" };
                writeln!(
                    out,
                    "{:<17} statistic {:>8.3}  p-value {:.4}  lags {}  {}",
                    name,
                    test.statistic,
                    test.p_value,
                    test.used_lag,
                    if test.is_stationary {
                        "stationary"
                    } else {
                        "non-stationary"
                    }
                )?;
            }
            writeln!(out, "Recommended differencing: d = {}", choice.order)?;
        }
        None => writeln!(out, "Not available for this series")?,
    }
    writeln!(out, "Differencing used: d = {}", report.differencing)?;

    let model = &report.model;
    writeln!(out, "\n=== Model: ARIMA{} ===", model.order)?;
    for (i, phi) in model.ar.iter().enumerate() {
        writeln!(out, "ar.L{}: {:>9.4}", i + 1, phi)?;
    }
    for (i, theta) in model.ma.iter().enumerate() {
        writeln!(out, "ma.L{}: {:>9.4}", i + 1, theta)?;
    }
    if model.order.d == 0 {
        writeln!(out, "const: {:>9.4}", model.constant)?;
    }
    writeln!(out, "sigma2: {:.4}", model.sigma2)?;
    writeln!(out, "AIC: {:.2}", model.aic)?;

    let lb = &report.diagnostics.ljung_box;
    writeln!(
        out,
        "Ljung-Box Q({}) = {:.3}, p-value {:.4}",
        lb.lags, lb.statistic, lb.p_value
    )?;

    let holdout = &report.holdout;
    writeln!(
        out,
        "\n=== Hold-out: last {} weeks (trained on {}) ===",
        holdout.actual.len(),
        holdout.train_len
    )?;
    writeln!(
        out,
        "{:<10} {:>8} {:>10} {:>10} {:>10}",
        "week", "actual", "forecast", "lower", "upper"
    )?;
    for (i, label) in holdout.labels.iter().enumerate() {
        writeln!(
            out,
            "{:<10} {:>8.0} {:>10.1} {:>10.1} {:>10.1}",
            label.to_string(),
            holdout.actual[i],
            holdout.forecast.forecast[i],
            holdout.forecast.lower[i],
            holdout.forecast.upper[i]
        )?;
    }
    let metrics = &holdout.metrics;
    writeln!(out, "MAPE: {:.4}", metrics.mape)?;
    writeln!(out, "sMAPE: {:.4}", metrics.smape)?;
    writeln!(out, "MAE: {:.2}", metrics.mae)?;
    writeln!(out, "RMSE: {:.2}", metrics.rmse)?;

    if let Some(future) = &report.future {
        writeln!(
            out,
            "\n=== Forecast: next {} weeks ({:.0}% interval) ===",
            future.labels.len(),
            future.forecast.confidence_level * 100.0
        )?;
        write_band(out, &future.labels, &future.forecast)?;
    }

    Ok(())
}

fn write_band<W: Write>(
    out: &mut W,
    labels: &[WeekLabel],
    band: &ForecastWithConfidence,
) -> io::Result<()> {
    writeln!(
        out,
        "{:<10} {:>10} {:>10} {:>10}",
        "week", "forecast", "lower", "upper"
    )?;
    for (i, label) in labels.iter().enumerate().take(band.len()) {
        writeln!(
            out,
            "{:<10} {:>10.1} {:>10.1} {:>10.1}",
            label.to_string(),
            band.forecast[i],
            band.lower[i],
            band.upper[i]
        )?;
    }
    Ok(())
}

/// Write the report as pretty JSON, creating parent directories
pub fn write_json(report: &PatronageReport, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    info!(path = %path.display(), "wrote JSON report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForecastConfig;
    use crate::pipeline::analyse;
    use crate::series::WeeklyPatronage;
    use tempfile::tempdir;

    fn sample_report() -> PatronageReport {
        let customers: Vec<f64> = (0..40)
            .map(|t| 120.0 + ((t * 7) % 11) as f64 * 3.0 - ((t * 5) % 7) as f64 * 2.0)
            .collect();
        let mut label = WeekLabel::calendar(2011, 1);
        let labels = customers
            .iter()
            .map(|_| {
                let current = label;
                label = label.next();
                current
            })
            .collect();
        let series = WeeklyPatronage { labels, customers };
        analyse(&series, &ForecastConfig::default()).unwrap()
    }

    #[test]
    fn test_write_report_contains_sections() {
        let report = sample_report();
        let mut buffer = Vec::new();
        write_report(&mut buffer, &report).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("Weeks observed: 40"));
        assert!(text.contains("Span: 2011-W01 to 2011-W40"));
        assert!(text.contains("=== Model: ARIMA(1,1,1) ==="));
        assert!(text.contains("ar.L1:"));
        assert!(text.contains("ma.L1:"));
        assert!(text.contains("MAPE: "));
        assert!(text.contains("2011-W37"));
        assert!(text.contains("next 12 weeks (95% interval)"));
        assert!(text.contains("2011-W52"));
    }

    #[test]
    fn test_write_json_creates_directories() {
        let report = sample_report();
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");

        write_json(&report, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["holdout"]["train_len"], 36);
        assert_eq!(value["model"]["order"]["d"], 1);
        assert_eq!(value["series"]["customers"].as_array().unwrap().len(), 40);
    }
}
