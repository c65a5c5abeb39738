//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over data sources (Yahoo Finance, CSV
//! directories, synthetic data, the Parquet cache) so the pipeline never sees
//! source-specific details and tests can substitute an in-memory source.

use crate::domain::{TickerHistory, TimeSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One daily row as delivered by a source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub date: NaiveDate,
    pub adj_close: Option<f64>,
    pub volume: Option<f64>,
}

/// Structured error types for data operations.
///
/// These are designed to be displayable in CLI output and in warnings.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("ticker not found: {ticker}")]
    TickerNotFound { ticker: String },

    #[error("no rows for {ticker} between {start} and {end}")]
    EmptyRange {
        ticker: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no cached data for ticker '{ticker}'; run `download {ticker}` first")]
    NoCachedData { ticker: String },

    #[error("csv error: {0}")]
    Csv(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Result of a successful fetch for a single ticker.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub ticker: String,
    pub quotes: Vec<Quote>,
    pub source: DataSource,
}

impl FetchResult {
    /// Convert rows into the normalized history shape.
    ///
    /// The volume series is dropped when the source sent no volume at all.
    pub fn into_history(self) -> TickerHistory {
        history_from_quotes(&self.quotes)
    }
}

/// Build a history from rows; duplicate dates keep the last row.
pub fn history_from_quotes(quotes: &[Quote]) -> TickerHistory {
    let adj_close = TimeSeries::from_points(quotes.iter().map(|q| (q.date, q.adj_close)));
    let has_volume = quotes.iter().any(|q| q.volume.is_some());
    let volume = has_volume
        .then(|| TimeSeries::from_points(quotes.iter().map(|q| (q.date, q.volume))));
    TickerHistory::new(adj_close, volume)
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    YahooFinance,
    CsvImport,
    Cache,
    Synthetic,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataSource::YahooFinance => "yahoo",
            DataSource::CsvImport => "csv",
            DataSource::Cache => "cache",
            DataSource::Synthetic => "synthetic",
        };
        f.write_str(name)
    }
}

/// Trait for data providers (Yahoo Finance, CSV import, etc).
///
/// Implementations handle the specifics of fetching data from one source.
/// A fetch that yields no rows is an error, never an empty success.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily rows for a ticker over an inclusive date range.
    fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError>;
}

impl<P: DataProvider + ?Sized> DataProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        (**self).fetch(ticker, start, end)
    }
}

/// Progress callback for multi-ticker operations.
pub trait FetchProgress: Send {
    /// Called when starting to fetch a ticker.
    fn on_start(&self, ticker: &str, index: usize, total: usize);

    /// Called when a ticker fetch completes; `Ok` carries the row count.
    fn on_complete(&self, ticker: &str, result: &Result<usize, DataError>);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_start(&self, ticker: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {ticker}...", index + 1, total);
    }

    fn on_complete(&self, ticker: &str, result: &Result<usize, DataError>) {
        match result {
            Ok(rows) => println!("  OK: {ticker} ({rows} rows)"),
            Err(e) => println!("  FAIL: {ticker}: {e}"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        println!("Fetch complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Progress reporter that stays silent.
pub struct NoProgress;

impl FetchProgress for NoProgress {
    fn on_start(&self, _ticker: &str, _index: usize, _total: usize) {}

    fn on_complete(&self, _ticker: &str, _result: &Result<usize, DataError>) {}

    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}
