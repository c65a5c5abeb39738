//! Dispersion of a ratio around its moving average.
//!
//! `dispersion = ratio - sma` wherever both are defined. Percentile markers
//! use linear interpolation between closest ranks (numpy's default).

use crate::domain::TimeSeries;
use serde::{Deserialize, Serialize};

/// Default number of histogram bins.
pub const DEFAULT_BINS: usize = 40;

/// Which percentile markers to draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentileSet {
    /// 25 / 50 / 75
    #[default]
    Quartiles,
    /// 5 / 25 / 50 / 75 / 95
    Extended,
}

impl PercentileSet {
    pub fn levels(&self) -> &'static [f64] {
        match self {
            PercentileSet::Quartiles => &[25.0, 50.0, 75.0],
            PercentileSet::Extended => &[5.0, 25.0, 50.0, 75.0, 95.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileMarker {
    pub level: f64,
    pub value: f64,
}

/// One histogram bar. `upper` is exclusive except for the last bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispersionHistogram {
    pub dispersion: TimeSeries,
    pub markers: Vec<PercentileMarker>,
    pub bins: Vec<HistogramBin>,
}

impl DispersionHistogram {
    /// Histogram with no markers, returned when there are too few points.
    pub fn empty(dispersion: TimeSeries) -> Self {
        Self {
            dispersion,
            markers: Vec::new(),
            bins: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Number of defined dispersion points.
    pub fn points(&self) -> usize {
        self.dispersion.defined_count()
    }

    pub fn marker(&self, level: f64) -> Option<f64> {
        self.markers
            .iter()
            .find(|m| (m.level - level).abs() < f64::EPSILON)
            .map(|m| m.value)
    }
}

/// `ratio - sma` on the points where both are defined.
///
/// Both series must share one index, which holds for an SMA computed from
/// the ratio itself. The result is compacted to the defined points.
pub fn dispersion(ratio: &TimeSeries, sma: &TimeSeries) -> TimeSeries {
    TimeSeries::from_points(
        ratio
            .defined()
            .filter_map(|(d, r)| sma.get(d).map(|m| (d, Some(r - m)))),
    )
}

/// Linear-interpolation percentile of an ascending slice, `p` in `[0, 100]`.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 || !(0.0..=100.0).contains(&p) {
        return None;
    }
    if n == 1 {
        return Some(sorted[0]);
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Equal-width bins spanning the value range.
pub fn histogram_bins(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max == min {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: values.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins {
                max
            } else {
                min + width * (i + 1) as f64
            },
            count,
        })
        .collect()
}

/// Build the dispersion histogram. Fewer than two points gives an empty one.
pub fn dispersion_histogram(
    ratio: &TimeSeries,
    sma: &TimeSeries,
    set: PercentileSet,
    bins: usize,
) -> DispersionHistogram {
    let series = dispersion(ratio, sma);
    let mut values = series.defined_values();
    if values.len() < 2 {
        return DispersionHistogram::empty(series);
    }

    values.sort_by(f64::total_cmp);
    let markers = set
        .levels()
        .iter()
        .filter_map(|&level| {
            percentile(&values, level).map(|value| PercentileMarker { level, value })
        })
        .collect();

    DispersionHistogram {
        bins: histogram_bins(&values, bins),
        dispersion: series,
        markers,
    }
}
