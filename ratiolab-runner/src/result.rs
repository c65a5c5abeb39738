//! Analysis results.

use chrono::NaiveDate;
use ratiolab_core::analysis::{
    DispersionHistogram, Pair, RatioMode, ResolvedReference, RollingStats, WarningLog,
};
use ratiolab_core::data::DataSource;
use ratiolab_core::domain::TimeSeries;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::chart::ChartSpec;
use crate::config::AnalysisConfig;

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Everything computed for one (main, comparison) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairAnalysis {
    pub pair: Pair,
    /// Mode actually used after any volume fallback.
    pub mode: RatioMode,
    /// Dates where every input of the ratio was present.
    pub valid_points: usize,
    /// Points dropped because the denominator was zero.
    pub excluded_points: usize,
    /// The raw ratio.
    pub ratio: TimeSeries,
    /// Present only in percentage mode.
    pub reference: Option<ResolvedReference>,
    /// What is drawn: the rebased ratio in percentage mode, else the raw ratio.
    pub plotted: TimeSeries,
    pub stats: RollingStats,
}

impl PairAnalysis {
    pub fn label(&self) -> String {
        self.pair.label()
    }
}

/// Complete result of one analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// The validated request.
    pub config: AnalysisConfig,
    pub fingerprint: String,
    pub reference_date: NaiveDate,
    /// One entry per comparison that could be analysed, in request order.
    pub pairs: Vec<PairAnalysis>,
    /// Only when exactly one comparison was requested.
    pub histogram: Option<DispersionHistogram>,
    pub chart: ChartSpec,
    pub warnings: WarningLog,
    /// Where each ticker's data came from.
    pub sources: BTreeMap<String, DataSource>,
}

impl AnalysisReport {
    /// First twelve hex characters of the fingerprint.
    pub fn short_id(&self) -> &str {
        let end = self.fingerprint.len().min(12);
        &self.fingerprint[..end]
    }

    pub fn pair(&self, label: &str) -> Option<&PairAnalysis> {
        self.pairs.iter().find(|p| p.label() == label)
    }

    /// Comparisons requested but not present in `pairs`.
    pub fn skipped(&self) -> Vec<&str> {
        self.config
            .comparisons
            .iter()
            .filter(|c| !self.pairs.iter().any(|p| &p.pair.other == *c))
            .map(String::as_str)
            .collect()
    }
}
