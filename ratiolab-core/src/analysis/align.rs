//! Pair alignment.
//!
//! Given the frame and a (main, other) pair, build the union date index of
//! every series the ratio needs and mark the dates where all of them are
//! present. Gaps stay absent unless forward fill is requested.

use super::ratio::RatioMode;
use super::warning::{Warning, WarningLog};
use crate::domain::{TickerFrame, TimeSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A main ticker compared against one other ticker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    pub main: String,
    pub other: String,
}

impl Pair {
    pub fn new(main: impl Into<String>, other: impl Into<String>) -> Self {
        Self {
            main: main.into(),
            other: other.into(),
        }
    }

    /// Label used in traces and warnings, e.g. `GGAL.BA/YPFD.BA`.
    pub fn label(&self) -> String {
        format!("{}/{}", self.main, self.other)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main, self.other)
    }
}

/// How missing values are treated before masking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// A date is usable only when every series has a real value.
    #[default]
    None,
    /// Missing values take the last earlier value of the same series.
    ForwardFill,
}

/// Dates of the union index and whether each one is usable.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidMask {
    dates: Vec<NaiveDate>,
    valid: Vec<bool>,
}

impl ValidMask {
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn flags(&self) -> &[bool] {
        &self.valid
    }

    pub fn is_valid(&self, index: usize) -> bool {
        self.valid.get(index).copied().unwrap_or(false)
    }

    /// Number of usable dates.
    pub fn count(&self) -> usize {
        self.valid.iter().filter(|v| **v).count()
    }

    pub fn valid_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates
            .iter()
            .zip(&self.valid)
            .filter(|(_, v)| **v)
            .map(|(d, _)| *d)
    }
}

/// Series of one pair laid out on a common index.
#[derive(Debug, Clone)]
pub struct AlignedPair {
    pub pair: Pair,
    /// Mode actually used; may differ from the requested one after fallback.
    pub mode: RatioMode,
    pub mask: ValidMask,
    pub main_price: Vec<Option<f64>>,
    pub other_price: Vec<Option<f64>>,
    pub main_volume: Option<Vec<Option<f64>>>,
    pub other_volume: Option<Vec<Option<f64>>>,
}

/// Why a pair could not be aligned. Always recoverable.
#[derive(Debug, Clone, PartialEq)]
pub enum PairIssue {
    /// The comparison ticker has no price data.
    OtherMissing,
    /// Both have data but never on the same usable date.
    NoOverlap,
}

impl PairIssue {
    /// Warning to report when the pair is skipped.
    pub fn to_warning(&self, pair: &Pair) -> Warning {
        match self {
            PairIssue::OtherMissing => Warning::DataUnavailable {
                ticker: pair.other.clone(),
                reason: "no price history".into(),
            },
            PairIssue::NoOverlap => Warning::NoOverlap { pair: pair.label() },
        }
    }
}

/// Align `pair` for the given ratio mode.
///
/// Falls back to price-only mode, with a warning, when volume is requested
/// but either side lacks it. The main ticker is assumed to carry data; the
/// caller checks that once per invocation.
pub fn align_pair(
    frame: &TickerFrame,
    pair: &Pair,
    requested: RatioMode,
    fill: FillPolicy,
    warnings: &mut WarningLog,
) -> Result<AlignedPair, PairIssue> {
    let empty = TimeSeries::new();
    let main = frame.get(&pair.main);
    let other = match frame.get(&pair.other) {
        Some(h) if !h.is_empty() => h,
        _ => return Err(PairIssue::OtherMissing),
    };
    let main_price = main.map(|h| &h.adj_close).unwrap_or(&empty);

    let mode = match requested {
        RatioMode::PriceVolumeRatio
            if !(main.is_some_and(|h| h.has_volume()) && other.has_volume()) =>
        {
            warnings.push(Warning::VolumeFallback { pair: pair.label() });
            RatioMode::PriceRatio
        }
        m => m,
    };

    let volumes = match mode {
        RatioMode::PriceVolumeRatio => main
            .and_then(|h| h.volume.as_ref())
            .zip(other.volume.as_ref()),
        RatioMode::PriceRatio => None,
    };

    let mut involved: Vec<&TimeSeries> = vec![main_price, &other.adj_close];
    if let Some((mv, ov)) = volumes {
        involved.push(mv);
        involved.push(ov);
    }
    let dates = union_index(&involved);

    let lay_out = |series: &TimeSeries| {
        let raw = series.reindex(&dates);
        match fill {
            FillPolicy::None => raw,
            FillPolicy::ForwardFill => forward_fill(raw),
        }
    };

    let main_price = lay_out(main_price);
    let other_price = lay_out(&other.adj_close);
    let main_volume = volumes.map(|(mv, _)| lay_out(mv));
    let other_volume = volumes.map(|(_, ov)| lay_out(ov));

    let valid: Vec<bool> = (0..dates.len())
        .map(|i| {
            let prices = main_price[i].is_some() && other_price[i].is_some();
            let vols = match (&main_volume, &other_volume) {
                (Some(mv), Some(ov)) => mv[i].is_some() && ov[i].is_some(),
                _ => true,
            };
            prices && vols
        })
        .collect();

    let mask = ValidMask { dates, valid };
    if mask.count() == 0 {
        return Err(PairIssue::NoOverlap);
    }

    Ok(AlignedPair {
        pair: pair.clone(),
        mode,
        mask,
        main_price,
        other_price,
        main_volume,
        other_volume,
    })
}

fn union_index(series: &[&TimeSeries]) -> Vec<NaiveDate> {
    let all: BTreeSet<NaiveDate> = series
        .iter()
        .flat_map(|s| s.dates().iter().copied())
        .collect();
    all.into_iter().collect()
}

fn forward_fill(values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    let mut last = None;
    values
        .into_iter()
        .map(|v| {
            if v.is_some() {
                last = v;
            }
            last
        })
        .collect()
}
