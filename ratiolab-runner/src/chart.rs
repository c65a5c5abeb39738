//! Presentation adapter: pipeline outputs to a renderer-neutral chart
//! description.
//!
//! Each analysed pair contributes five line traces (ratio, rolling mean,
//! upper and lower band, SMA) and three horizontal lines for the whole-series
//! bands. Absent values serialize as `null`, which chart libraries draw as
//! gaps. A single-comparison analysis also gets a histogram panel.

use chrono::NaiveDate;
use ratiolab_core::analysis::{DispersionHistogram, HistogramBin, PercentileMarker, Warning, WarningLog};
use ratiolab_core::domain::TimeSeries;
use serde::{Deserialize, Serialize};

use crate::result::PairAnalysis;

pub const RATIO_AXIS: &str = "Ratio";
pub const PERCENT_AXIS: &str = "Percentage (%)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    Ratio,
    RollingMean,
    UpperBand,
    LowerBand,
    Sma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    Solid,
    Dash,
    Dot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub name: String,
    pub pair: String,
    pub kind: TraceKind,
    pub style: LineStyle,
    pub x: Vec<NaiveDate>,
    pub y: Vec<Option<f64>>,
}

impl Trace {
    fn from_series(pair: &str, kind: TraceKind, series: &TimeSeries) -> Self {
        let (suffix, style) = match kind {
            TraceKind::Ratio => ("", LineStyle::Solid),
            TraceKind::RollingMean => (" mean", LineStyle::Dot),
            TraceKind::UpperBand => (" upper", LineStyle::Dash),
            TraceKind::LowerBand => (" lower", LineStyle::Dash),
            TraceKind::Sma => (" SMA", LineStyle::Solid),
        };
        Self {
            name: format!("{pair}{suffix}"),
            pair: pair.to_string(),
            kind,
            style,
            x: series.dates().to_vec(),
            y: series.values().to_vec(),
        }
    }
}

/// A flat line across the whole chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HLine {
    pub pair: String,
    pub label: String,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub title: String,
    pub log_scale: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramPanel {
    pub title: String,
    pub x_title: String,
    pub bins: Vec<HistogramBin>,
    /// Drawn as vertical lines.
    pub markers: Vec<PercentileMarker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub title: String,
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub traces: Vec<Trace>,
    pub hlines: Vec<HLine>,
    pub histogram: Option<HistogramPanel>,
}

impl ChartSpec {
    pub fn traces_for(&self, pair: &str) -> impl Iterator<Item = &Trace> {
        let pair = pair.to_string();
        self.traces.iter().filter(move |t| t.pair == pair)
    }

    pub fn trace(&self, pair: &str, kind: TraceKind) -> Option<&Trace> {
        self.traces.iter().find(|t| t.pair == pair && t.kind == kind)
    }
}

/// Build the chart for `pairs`.
///
/// Log scale is refused in percentage mode, where values can be zero or
/// negative; the refusal is reported as a warning.
pub fn build_chart(
    main: &str,
    pairs: &[PairAnalysis],
    histogram: Option<&DispersionHistogram>,
    percentage: bool,
    log_scale: bool,
    warnings: &mut WarningLog,
) -> ChartSpec {
    let log_scale = if percentage && log_scale {
        warnings.push(Warning::LogScaleDisabled);
        false
    } else {
        log_scale
    };

    let mut traces = Vec::with_capacity(pairs.len() * 5);
    let mut hlines = Vec::new();
    for analysis in pairs {
        let label = analysis.label();
        let bands = &analysis.stats.bands;
        traces.push(Trace::from_series(&label, TraceKind::Ratio, &analysis.plotted));
        traces.push(Trace::from_series(&label, TraceKind::RollingMean, &bands.mean));
        traces.push(Trace::from_series(&label, TraceKind::UpperBand, &bands.upper));
        traces.push(Trace::from_series(&label, TraceKind::LowerBand, &bands.lower));
        traces.push(Trace::from_series(&label, TraceKind::Sma, &analysis.stats.sma));

        if let Some(global) = bands.global {
            let k = bands.multiplier;
            hlines.push(HLine {
                pair: label.clone(),
                label: format!("{label} mean"),
                y: global.mean,
            });
            hlines.push(HLine {
                pair: label.clone(),
                label: format!("{label} +{k}σ"),
                y: global.upper,
            });
            hlines.push(HLine {
                pair: label.clone(),
                label: format!("{label} -{k}σ"),
                y: global.lower,
            });
        }
    }

    let histogram = histogram
        .filter(|h| !h.is_empty())
        .zip(pairs.first())
        .map(|(h, analysis)| HistogramPanel {
            title: format!("{} dispersion from SMA", analysis.label()),
            x_title: "Ratio - SMA".into(),
            bins: h.bins.clone(),
            markers: h.markers.clone(),
        });

    ChartSpec {
        title: format!("Ratios of {main}"),
        x_axis: Axis {
            title: "Date".into(),
            log_scale: false,
        },
        y_axis: Axis {
            title: if percentage { PERCENT_AXIS } else { RATIO_AXIS }.into(),
            log_scale,
        },
        traces,
        hlines,
        histogram,
    }
}
