//! Recoverable conditions reported alongside degraded output.
//!
//! Nothing in here aborts an analysis. Every warning is logged through
//! `tracing` when recorded and kept so the caller can show it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-fatal condition met while fetching or computing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Ticker not found, fetch failure, or empty result.
    DataUnavailable { ticker: String, reason: String },

    /// The same comparison ticker was requested twice.
    DuplicateTicker { ticker: String },

    /// Main and comparison never have prices on the same date.
    NoOverlap { pair: String },

    /// Volume weighting was requested but one side has no volume.
    VolumeFallback { pair: String },

    /// Points whose denominator was zero were left out of the ratio.
    DivisionByZeroExcluded { pair: String, count: usize },

    /// The reference date was not in the index; the nearest one was used.
    ReferenceSubstituted {
        pair: String,
        requested: NaiveDate,
        resolved: NaiveDate,
    },

    /// Not enough consecutive points for the rolling window.
    InsufficientWindow {
        pair: String,
        window: usize,
        longest_run: usize,
    },

    /// Fewer than two dispersion points; no percentiles computed.
    EmptyHistogram { pair: String, points: usize },

    /// Log scale cannot show percentages at or below zero.
    LogScaleDisabled,

    /// The exchange-rate series could not be built; prices stay in pesos.
    CclUnavailable { reason: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::DataUnavailable { ticker, reason } => {
                write!(f, "no data for {ticker}: {reason}")
            }
            Warning::DuplicateTicker { ticker } => {
                write!(f, "{ticker} requested more than once; ignoring repeats")
            }
            Warning::NoOverlap { pair } => {
                write!(f, "{pair}: no common dates with valid prices, skipped")
            }
            Warning::VolumeFallback { pair } => {
                write!(f, "{pair}: volume unavailable, using price ratio")
            }
            Warning::DivisionByZeroExcluded { pair, count } => {
                write!(f, "{pair}: {count} point(s) with zero denominator excluded")
            }
            Warning::ReferenceSubstituted {
                pair,
                requested,
                resolved,
            } => write!(
                f,
                "{pair}: reference date {requested} not available, using {resolved}"
            ),
            Warning::InsufficientWindow {
                pair,
                window,
                longest_run,
            } => write!(
                f,
                "{pair}: window {window} needs more data (longest run is {longest_run} point(s))"
            ),
            Warning::EmptyHistogram { pair, points } => {
                write!(f, "{pair}: dispersion histogram empty ({points} point(s))")
            }
            Warning::LogScaleDisabled => {
                write!(f, "log scale disabled while showing percentages")
            }
            Warning::CclUnavailable { reason } => {
                write!(f, "CCL normalization skipped: {reason}")
            }
        }
    }
}

/// Ordered collection of warnings for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarningLog {
    entries: Vec<Warning>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it.
    pub fn push(&mut self, warning: Warning) {
        tracing::warn!("{warning}");
        self.entries.push(warning);
    }

    /// Append warnings that were already logged elsewhere.
    pub fn absorb(&mut self, other: WarningLog) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
