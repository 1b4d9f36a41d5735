//! Forecast figures rendered with Plotters

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::{info, warn};

use crate::pipeline::PatronageReport;

pub const ACF_FIGURE: &str = "cpf-acf-parameter-plot.png";
pub const PACF_FIGURE: &str = "cpf-pacf-parameter-plot.png";
pub const DIAGNOSTIC_FIGURE: &str = "cpf-diagnostic-plot.png";
pub const FORECAST_FIGURE: &str = "customer-patronage-forecast.png";

const NAVY: RGBColor = RGBColor(0, 0, 128);
const BAND: RGBColor = RGBColor(135, 206, 250);

type Figure = fn(&PatronageReport, &Path) -> anyhow::Result<()>;

/// Render every figure into `dir`
///
/// A figure that fails to render is logged and skipped, so the returned
/// list only holds files that were actually written.
pub fn generate_figures(report: &PatronageReport, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating figures directory {}", dir.display()))?;

    let figures: [(&str, Figure); 4] = [
        (ACF_FIGURE, create_acf_plot),
        (PACF_FIGURE, create_pacf_plot),
        (DIAGNOSTIC_FIGURE, create_diagnostic_plot),
        (FORECAST_FIGURE, create_forecast_plot),
    ];

    let mut written = Vec::new();
    for (name, render) in figures {
        let path = dir.join(name);
        match render(report, &path) {
            Ok(()) => {
                info!(path = %path.display(), "saved figure");
                written.push(path);
            }
            Err(e) => warn!(figure = name, error = %e, "failed to render figure"),
        }
    }
    Ok(written)
}

/// Bar correlogram of the differenced series' ACF
pub fn create_acf_plot(report: &PatronageReport, path: &Path) -> anyhow::Result<()> {
    let correlation = &report.correlation;
    let title = format!("Autocorrelation (d = {})", correlation.differencing);
    let root = BitMapBackend::new(path, (900, 500)).into_drawing_area();
    root.fill(&WHITE)?;
    draw_correlogram(&root, &correlation.acf, correlation.bound, &title)?;
    root.present()?;
    Ok(())
}

pub fn create_pacf_plot(report: &PatronageReport, path: &Path) -> anyhow::Result<()> {
    let correlation = &report.correlation;
    let title = format!("Partial Autocorrelation (d = {})", correlation.differencing);
    let root = BitMapBackend::new(path, (900, 500)).into_drawing_area();
    root.fill(&WHITE)?;
    draw_correlogram(&root, &correlation.pacf, correlation.bound, &title)?;
    root.present()?;
    Ok(())
}

/// Residual trace above the residual correlogram
pub fn create_diagnostic_plot(report: &PatronageReport, path: &Path) -> anyhow::Result<()> {
    let diagnostics = &report.diagnostics;
    let residuals = &diagnostics.residuals;

    let root = BitMapBackend::new(path, (900, 800)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 1));

    let (y_min, y_max) = padded_range(residuals.iter().copied());
    let mut chart = ChartBuilder::on(&panels[0])
        .caption(
            format!("Residuals of ARIMA{}", report.model.order),
            ("sans-serif", 24),
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..(residuals.len().max(1) as f64), y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Week")
        .y_desc("Residual")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(LineSeries::new(
        residuals.iter().enumerate().map(|(i, &r)| (i as f64, r)),
        &NAVY,
    ))?;
    chart.draw_series(LineSeries::new(
        vec![(0.0, 0.0), (residuals.len() as f64, 0.0)],
        &BLACK,
    ))?;

    let lb = &diagnostics.ljung_box;
    let title = format!("Residual ACF (Ljung-Box p = {:.3})", lb.p_value);
    draw_correlogram(&panels[1], &diagnostics.residual_acf, diagnostics.bound, &title)?;

    root.present()?;
    Ok(())
}

/// Weekly series on top, hold-out and future forecasts with bands below
pub fn create_forecast_plot(report: &PatronageReport, path: &Path) -> anyhow::Result<()> {
    let series = &report.series;
    let holdout = &report.holdout;
    let n = series.len();

    let mut labels: Vec<String> = series.labels.iter().map(ToString::to_string).collect();
    if let Some(future) = &report.future {
        labels.extend(future.labels.iter().map(ToString::to_string));
    }
    let label_at = |x: &f64| -> String {
        let i = x.round();
        if i >= 0.0 && (i as usize) < labels.len() {
            labels[i as usize].clone()
        } else {
            String::new()
        }
    };

    let root = BitMapBackend::new(path, (1200, 900)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 1));

    // Top: the weekly series
    let (y_min, y_max) = padded_range(series.customers.iter().copied());
    let mut chart = ChartBuilder::on(&panels[0])
        .caption("Weekly Unique Customers", ("sans-serif", 26))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..(n.max(2) - 1) as f64, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Week")
        .y_desc("Customers")
        .x_label_formatter(&label_at)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(LineSeries::new(
        series
            .customers
            .iter()
            .enumerate()
            .map(|(i, &v)| (i as f64, v)),
        &NAVY,
    ))?;

    // Bottom: observed, hold-out forecast and future forecast
    let future_len = report.future.as_ref().map_or(0, |f| f.forecast.len());
    let x_max = (n + future_len).max(2) - 1;
    let mut bounds: Vec<f64> = series.customers.clone();
    bounds.extend(holdout.forecast.lower.iter().chain(&holdout.forecast.upper));
    if let Some(future) = &report.future {
        bounds.extend(future.forecast.lower.iter().chain(&future.forecast.upper));
    }
    let (y_min, y_max) = padded_range(bounds.into_iter());

    let mut chart = ChartBuilder::on(&panels[1])
        .caption(
            format!(
                "ARIMA{} Forecast ({:.0}% interval)",
                report.model.order,
                holdout.forecast.confidence_level * 100.0
            ),
            ("sans-serif", 26),
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..x_max as f64, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Week")
        .y_desc("Customers")
        .x_label_formatter(&label_at)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    let start = holdout.train_len;
    draw_band(
        &mut chart,
        start,
        &holdout.forecast.lower,
        &holdout.forecast.upper,
    )?;
    if let Some(future) = &report.future {
        draw_band(&mut chart, n, &future.forecast.lower, &future.forecast.upper)?;
    }

    chart
        .draw_series(LineSeries::new(
            series
                .customers
                .iter()
                .enumerate()
                .map(|(i, &v)| (i as f64, v)),
            &BLACK.mix(0.4),
        ))?
        .label("Original")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.mix(0.4)));

    chart
        .draw_series(LineSeries::new(
            series.customers[..start]
                .iter()
                .enumerate()
                .map(|(i, &v)| (i as f64, v)),
            &NAVY,
        ))?
        .label("Observed")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], NAVY));

    chart
        .draw_series(LineSeries::new(
            holdout
                .forecast
                .forecast
                .iter()
                .enumerate()
                .map(|(i, &v)| ((start + i) as f64, v)),
            &RED,
        ))?
        .label("Hold-out forecast")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    if let Some(future) = &report.future {
        chart
            .draw_series(LineSeries::new(
                future
                    .forecast
                    .forecast
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| ((n + i) as f64, v)),
                &GREEN,
            ))?
            .label("Future forecast")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn draw_correlogram(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    values: &[f64],
    bound: f64,
    title: &str,
) -> anyhow::Result<()> {
    let x_max = values.len().max(1) as f64 - 0.5;
    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..x_max, -1.1f64..1.1f64)?;

    chart
        .configure_mesh()
        .x_desc("Lag")
        .y_desc("Correlation")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    if bound.is_finite() {
        chart.draw_series(std::iter::once(Rectangle::new(
            [(-0.5, -bound), (x_max, bound)],
            BAND.mix(0.4).filled(),
        )))?;
    }

    chart.draw_series(values.iter().enumerate().map(|(lag, &v)| {
        let x = lag as f64;
        Rectangle::new([(x - 0.15, v.min(0.0)), (x + 0.15, v.max(0.0))], NAVY.filled())
    }))?;

    chart.draw_series(LineSeries::new(vec![(-0.5, 0.0), (x_max, 0.0)], &BLACK))?;
    Ok(())
}

fn draw_band(
    chart: &mut ChartContext<'_, BitMapBackend<'_>, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    start: usize,
    lower: &[f64],
    upper: &[f64],
) -> anyhow::Result<()> {
    if lower.is_empty() {
        return Ok(());
    }
    let points = band_polygon(start, lower, upper);
    chart.draw_series(std::iter::once(Polygon::new(points, BAND.mix(0.5).filled())))?;
    Ok(())
}

/// Outline of a confidence band: along the upper bound, back along the lower
fn band_polygon(start: usize, lower: &[f64], upper: &[f64]) -> Vec<(f64, f64)> {
    let upper_edge = upper
        .iter()
        .enumerate()
        .map(|(i, &u)| ((start + i) as f64, u));
    let lower_edge = lower
        .iter()
        .enumerate()
        .rev()
        .map(|(i, &l)| ((start + i) as f64, l));
    upper_edge.chain(lower_edge).collect()
}

/// Finite min/max of the values with 5% padding on both sides
fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < 1e-12 {
        return (min - 1.0, max + 1.0);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForecastConfig;
    use crate::pipeline::analyse;
    use crate::series::{WeekLabel, WeeklyPatronage};
    use tempfile::tempdir;

    #[test]
    fn test_padded_range() {
        let (lo, hi) = padded_range(vec![10.0, 20.0, f64::NAN].into_iter());
        assert!((lo - 9.5).abs() < 1e-12);
        assert!((hi - 20.5).abs() < 1e-12);

        assert_eq!(padded_range(vec![5.0, 5.0].into_iter()), (4.0, 6.0));
        assert_eq!(padded_range(std::iter::empty()), (0.0, 1.0));
    }

    #[test]
    fn test_band_polygon_closes_the_band() {
        let points = band_polygon(3, &[1.0, 2.0], &[5.0, 6.0]);
        assert_eq!(points, vec![(3.0, 5.0), (4.0, 6.0), (4.0, 2.0), (3.0, 1.0)]);
    }

    #[test]
    #[ignore = "requires system fonts for text rendering"]
    fn test_generate_figures() {
        let customers: Vec<f64> = (0..40)
            .map(|t| 90.0 + ((t * 7) % 13) as f64 * 2.0)
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
        let report = analyse(
            &WeeklyPatronage { labels, customers },
            &ForecastConfig::default(),
        )
        .unwrap();

        let dir = tempdir().unwrap();
        let written = generate_figures(&report, dir.path()).unwrap();

        assert_eq!(written.len(), 4);
        for name in [ACF_FIGURE, PACF_FIGURE, DIAGNOSTIC_FIGURE, FORECAST_FIGURE] {
            assert!(dir.path().join(name).exists());
        }
    }
}
