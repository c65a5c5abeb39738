//! Multi-ticker fetch: one uniform frame for any number of tickers.
//!
//! Failures never escape as errors. A ticker that cannot be fetched still
//! gets an (empty) entry in the frame and a `DataUnavailable` warning, so
//! downstream stages treat one ticker and many tickers identically.

use super::provider::{DataError, DataProvider, DataSource, FetchProgress};
use crate::analysis::{Warning, WarningLog};
use crate::domain::{TickerFrame, TickerHistory};
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct FetchedFrame {
    pub frame: TickerFrame,
    pub warnings: WarningLog,
    /// Where each successfully fetched ticker came from.
    pub sources: BTreeMap<String, DataSource>,
    pub failed: Vec<String>,
}

impl FetchedFrame {
    pub fn succeeded(&self) -> usize {
        self.sources.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fetch every ticker sequentially over `[start, end]`.
pub fn fetch_frame(
    provider: &dyn DataProvider,
    tickers: &[&str],
    start: NaiveDate,
    end: NaiveDate,
    progress: &dyn FetchProgress,
) -> FetchedFrame {
    let total = tickers.len();
    let mut out = FetchedFrame::default();

    for (i, &ticker) in tickers.iter().enumerate() {
        if out.frame.contains(ticker) {
            continue;
        }
        progress.on_start(ticker, i, total);

        let outcome = provider
            .fetch(ticker, start, end)
            .and_then(|result| {
                let source = result.source;
                let history = result.into_history().between(start, end);
                if history.is_empty() {
                    Err(DataError::EmptyRange {
                        ticker: ticker.to_string(),
                        start,
                        end,
                    })
                } else {
                    Ok((history, source))
                }
            });

        let reported = outcome
            .as_ref()
            .map(|(h, _)| h.adj_close.defined_count())
            .map_err(clone_for_progress);
        progress.on_complete(ticker, &reported);

        match outcome {
            Ok((history, source)) => {
                tracing::info!(
                    ticker,
                    provider = provider.name(),
                    %source,
                    points = history.adj_close.defined_count(),
                    "fetched"
                );
                out.sources.insert(ticker.to_string(), source);
                out.frame.insert(ticker, history);
            }
            Err(e) => {
                out.warnings.push(Warning::DataUnavailable {
                    ticker: ticker.to_string(),
                    reason: e.to_string(),
                });
                out.failed.push(ticker.to_string());
                out.frame.insert(ticker, TickerHistory::empty());
            }
        }
    }

    progress.on_batch_complete(out.succeeded(), out.failed.len(), out.frame.len());
    out
}

/// `DataError` is not `Clone`; progress only needs its message.
fn clone_for_progress(e: &DataError) -> DataError {
    match e {
        DataError::TickerNotFound { ticker } => DataError::TickerNotFound {
            ticker: ticker.clone(),
        },
        DataError::EmptyRange { ticker, start, end } => DataError::EmptyRange {
            ticker: ticker.clone(),
            start: *start,
            end: *end,
        },
        other => DataError::Other(other.to_string()),
    }
}
