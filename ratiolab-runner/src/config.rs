//! Serializable analysis request.
//!
//! Every CLI flag maps onto a field here, and the same struct loads from a
//! TOML file:
//!
//! ```toml
//! main = "GGAL.BA"
//! comparisons = ["YPFD.BA", "PAMP.BA"]
//! start = "2023-01-02"
//! end = "2024-06-28"
//! reference_date = "2023-06-01"
//!
//! [stats]
//! window = 20
//! band_multiplier = 2.0
//!
//! [ccl]
//! local = "YPFD.BA"
//! foreign = "YPF"
//! ```

use chrono::NaiveDate;
use ratiolab_core::analysis::{
    CclSource, FillPolicy, PercentileSet, RatioMode, Warning, WarningLog,
};
use ratiolab_core::analysis::dispersion::DEFAULT_BINS;
use ratiolab_core::analysis::rolling::{DEFAULT_BAND_MULTIPLIER, DEFAULT_WINDOW};
use ratiolab_core::domain::{normalize_ticker, TickerError, MAX_COMPARISONS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid main ticker: {0}")]
    InvalidMainTicker(TickerError),

    #[error("invalid comparison ticker: {0}")]
    InvalidComparison(TickerError),

    #[error("at most {max} comparison tickers are allowed, got {got}")]
    TooManyComparisons { max: usize, got: usize },

    #[error("end date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },

    #[error("{field} must be at least 1")]
    ZeroWindow { field: &'static str },

    #[error("band multiplier must be a positive finite number, got {0}")]
    InvalidMultiplier(f64),

    #[error("histogram needs at least one bin")]
    ZeroBins,

    #[error("CCL factor must be a positive finite number, got {0}")]
    InvalidCclFactor(f64),
}

/// Which backend supplies prices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    #[default]
    Yahoo,
    Csv,
    Synthetic,
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataSourceKind::Yahoo => "yahoo",
            DataSourceKind::Csv => "csv",
            DataSourceKind::Synthetic => "synthetic",
        })
    }
}

impl FromStr for DataSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yahoo" => Ok(DataSourceKind::Yahoo),
            "csv" => Ok(DataSourceKind::Csv),
            "synthetic" => Ok(DataSourceKind::Synthetic),
            other => Err(format!(
                "unknown data source '{other}' (expected yahoo, csv or synthetic)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub source: DataSourceKind,
    /// Root of the Parquet cache used in front of Yahoo.
    pub cache_dir: PathBuf,
    /// Directory of `{TICKER}.csv` files for the CSV source.
    pub csv_dir: PathBuf,
    pub use_cache: bool,
    pub force_refresh: bool,
    /// Seed for the synthetic source.
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: DataSourceKind::Yahoo,
            cache_dir: PathBuf::from("data"),
            csv_dir: PathBuf::from("data/csv"),
            use_cache: true,
            force_refresh: false,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Moving-average window.
    pub window: usize,
    /// Window of the deviation bands; the SMA window when unset.
    pub band_window: Option<usize>,
    pub band_multiplier: f64,
    pub percentiles: PercentileSet,
    pub histogram_bins: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            band_window: None,
            band_multiplier: DEFAULT_BAND_MULTIPLIER,
            percentiles: PercentileSet::default(),
            histogram_bins: DEFAULT_BINS,
        }
    }
}

impl StatsConfig {
    pub fn band_window(&self) -> usize {
        self.band_window.unwrap_or(self.window)
    }
}

fn default_true() -> bool {
    true
}

/// One analysis: a main ticker against up to six comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub main: String,
    #[serde(default)]
    pub comparisons: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Date the percentage view is measured from; the start date when unset.
    #[serde(default)]
    pub reference_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub percentage: bool,
    #[serde(default)]
    pub log_scale: bool,
    #[serde(default)]
    pub mode: RatioMode,
    #[serde(default)]
    pub fill: FillPolicy,
    #[serde(default)]
    pub stats: StatsConfig,
    /// Express prices in implied dollars before computing ratios.
    #[serde(default)]
    pub ccl: Option<CclSource>,
    #[serde(default)]
    pub data: DataConfig,
}

impl AnalysisConfig {
    /// A request with every optional setting at its default.
    pub fn new(
        main: impl Into<String>,
        comparisons: Vec<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            main: main.into(),
            comparisons,
            start,
            end,
            reference_date: None,
            percentage: true,
            log_scale: false,
            mode: RatioMode::default(),
            fill: FillPolicy::default(),
            stats: StatsConfig::default(),
            ccl: None,
            data: DataConfig::default(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date.unwrap_or(self.start)
    }

    /// Normalize tickers and check every constraint.
    ///
    /// Repeated comparisons, and comparisons equal to the main ticker, are
    /// dropped with a `DuplicateTicker` warning. The comparison limit is
    /// checked after de-duplication.
    pub fn validate(&mut self, warnings: &mut WarningLog) -> Result<(), ConfigError> {
        self.main = normalize_ticker(&self.main).map_err(ConfigError::InvalidMainTicker)?;

        let mut seen = HashSet::from([self.main.clone()]);
        let mut comparisons = Vec::with_capacity(self.comparisons.len());
        for raw in &self.comparisons {
            let ticker = normalize_ticker(raw).map_err(ConfigError::InvalidComparison)?;
            if seen.insert(ticker.clone()) {
                comparisons.push(ticker);
            } else {
                warnings.push(Warning::DuplicateTicker { ticker });
            }
        }
        if comparisons.len() > MAX_COMPARISONS {
            return Err(ConfigError::TooManyComparisons {
                max: MAX_COMPARISONS,
                got: comparisons.len(),
            });
        }
        self.comparisons = comparisons;

        if self.end < self.start {
            return Err(ConfigError::EndBeforeStart {
                start: self.start,
                end: self.end,
            });
        }
        if self.stats.window == 0 {
            return Err(ConfigError::ZeroWindow { field: "window" });
        }
        if self.stats.band_window == Some(0) {
            return Err(ConfigError::ZeroWindow {
                field: "band_window",
            });
        }
        let k = self.stats.band_multiplier;
        if !k.is_finite() || k <= 0.0 {
            return Err(ConfigError::InvalidMultiplier(k));
        }
        if self.stats.histogram_bins == 0 {
            return Err(ConfigError::ZeroBins);
        }

        if let Some(ccl) = &mut self.ccl {
            ccl.local = normalize_ticker(&ccl.local).map_err(ConfigError::InvalidComparison)?;
            ccl.foreign = normalize_ticker(&ccl.foreign).map_err(ConfigError::InvalidComparison)?;
            if !ccl.factor.is_finite() || ccl.factor <= 0.0 {
                return Err(ConfigError::InvalidCclFactor(ccl.factor));
            }
        }

        Ok(())
    }

    /// Deterministic BLAKE3 hash of the request.
    ///
    /// Two requests with identical settings share a fingerprint, which names
    /// the export directory.
    pub fn fingerprint(&self) -> String {
        // Plain structs of strings, numbers and dates always serialize
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
