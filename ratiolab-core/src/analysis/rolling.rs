//! Rolling mean, rolling standard deviation, and deviation bands.
//!
//! Windows are trailing and include the current point. A window that
//! contains an absent value yields an absent result, so every contiguous
//! run of values starts with `window - 1` absent outputs. When the series is
//! shorter than the window the outputs are entirely absent but keep the
//! input's index.
//!
//! Standard deviation is the sample estimate (divide by N - 1).

use crate::domain::TimeSeries;
use serde::{Deserialize, Serialize};

/// Default window for the moving average.
pub const DEFAULT_WINDOW: usize = 20;

/// Default band width in standard deviations.
pub const DEFAULT_BAND_MULTIPLIER: f64 = 2.0;

/// Simple moving average over the trailing `window` points.
pub fn sma(series: &TimeSeries, window: usize) -> TimeSeries {
    rolling_apply(series, window, mean)
}

/// Rolling sample standard deviation over the trailing `window` points.
///
/// A window of one has no sample deviation and is absent everywhere.
pub fn rolling_std(series: &TimeSeries, window: usize) -> TimeSeries {
    rolling_apply(series, window, sample_std)
}

/// Whole-series mean and deviation, drawn as flat lines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalBands {
    pub mean: f64,
    pub std: f64,
    pub upper: f64,
    pub lower: f64,
}

/// Rolling and whole-series `mean ± k·std` bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bands {
    pub multiplier: f64,
    pub mean: TimeSeries,
    pub std: TimeSeries,
    pub upper: TimeSeries,
    pub lower: TimeSeries,
    /// `None` when fewer than two points are defined.
    pub global: Option<GlobalBands>,
}

/// Compute rolling and whole-series bands at `k` standard deviations.
pub fn bands(series: &TimeSeries, window: usize, k: f64) -> Bands {
    let mean_series = sma(series, window);
    let std_series = rolling_std(series, window);

    let dates = series.dates().to_vec();
    let (upper, lower): (Vec<_>, Vec<_>) = mean_series
        .values()
        .iter()
        .zip(std_series.values())
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => (Some(m + k * s), Some(m - k * s)),
            _ => (None, None),
        })
        .unzip();

    Bands {
        multiplier: k,
        upper: TimeSeries::from_index(dates.clone(), upper),
        lower: TimeSeries::from_index(dates, lower),
        mean: mean_series,
        std: std_series,
        global: global_bands(series, k),
    }
}

/// Mean and sample deviation over every defined value.
pub fn global_bands(series: &TimeSeries, k: f64) -> Option<GlobalBands> {
    let values = series.defined_values();
    let mean = mean(&values)?;
    let std = sample_std(&values)?;
    Some(GlobalBands {
        mean,
        std,
        upper: mean + k * std,
        lower: mean - k * std,
    })
}

/// Moving average plus bands for one ratio series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingStats {
    pub sma_window: usize,
    pub band_window: usize,
    pub sma: TimeSeries,
    pub bands: Bands,
}

/// Compute the moving average and bands of `series`.
pub fn rolling_stats(
    series: &TimeSeries,
    sma_window: usize,
    band_window: usize,
    k: f64,
) -> RollingStats {
    RollingStats {
        sma_window,
        band_window,
        sma: sma(series, sma_window),
        bands: bands(series, band_window, k),
    }
}

/// Length of the longest run of consecutive defined points.
pub fn longest_run(series: &TimeSeries) -> usize {
    let mut best = 0;
    let mut current = 0;
    for v in series.values() {
        if v.is_some() {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

/// True when at least one full window fits in a contiguous run.
pub fn window_fits(series: &TimeSeries, window: usize) -> bool {
    window > 0 && longest_run(series) >= window
}

fn rolling_apply<F>(series: &TimeSeries, window: usize, f: F) -> TimeSeries
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let n = series.len();
    let mut result = vec![None; n];

    if window == 0 || n < window {
        return TimeSeries::from_index(series.dates().to_vec(), result);
    }

    let values = series.values();
    let mut buf = Vec::with_capacity(window);
    for i in (window - 1)..n {
        buf.clear();
        buf.extend(values[i + 1 - window..=i].iter().map_while(|v| *v));
        if buf.len() == window {
            result[i] = f(&buf);
        }
    }

    TimeSeries::from_index(series.dates().to_vec(), result)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}
