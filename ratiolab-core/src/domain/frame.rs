//! TickerFrame: the normalized shape every data source returns.
//!
//! One entry per requested ticker, whatever the number of tickers fetched.
//! A ticker whose fetch failed still has an entry, with empty series.

use super::series::TimeSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Adjusted close and (optionally) traded volume for one ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerHistory {
    pub adj_close: TimeSeries,
    pub volume: Option<TimeSeries>,
}

impl TickerHistory {
    pub fn new(adj_close: TimeSeries, volume: Option<TimeSeries>) -> Self {
        Self { adj_close, volume }
    }

    /// History with no data at all (the shape of a failed fetch).
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when there is no usable price.
    pub fn is_empty(&self) -> bool {
        self.adj_close.is_all_missing()
    }

    /// True when a volume series exists and carries at least one value.
    pub fn has_volume(&self) -> bool {
        self.volume.as_ref().is_some_and(|v| !v.is_all_missing())
    }

    /// Keep only dates in `[start, end]`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            adj_close: self.adj_close.between(start, end),
            volume: self.volume.as_ref().map(|v| v.between(start, end)),
        }
    }
}

/// Mapping from ticker symbol to its history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerFrame {
    entries: BTreeMap<String, TickerHistory>,
}

impl TickerFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: impl Into<String>, history: TickerHistory) {
        self.entries.insert(ticker.into(), history);
    }

    pub fn get(&self, ticker: &str) -> Option<&TickerHistory> {
        self.entries.get(ticker)
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.entries.contains_key(ticker)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply `f` to every history, producing a new frame.
    pub fn map_histories<F>(&self, mut f: F) -> TickerFrame
    where
        F: FnMut(&str, &TickerHistory) -> TickerHistory,
    {
        let entries = self
            .entries
            .iter()
            .map(|(t, h)| (t.clone(), f(t, h)))
            .collect();
        TickerFrame { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[test]
    fn between_clips_price_and_volume() {
        let h = TickerHistory::new(
            TimeSeries::daily(d(1), &[1.0, 2.0, 3.0]),
            Some(TimeSeries::daily(d(1), &[10.0, 20.0, 30.0])),
        );
        let clipped = h.between(d(2), d(3));
        assert_eq!(clipped.adj_close.defined_values(), vec![2.0, 3.0]);
        assert_eq!(clipped.volume.unwrap().defined_values(), vec![20.0, 30.0]);
    }

    #[test]
    fn map_histories_keeps_every_ticker() {
        let mut frame = TickerFrame::new();
        frame.insert("A", TickerHistory::new(TimeSeries::daily(d(1), &[1.0, 2.0]), None));
        frame.insert("B", TickerHistory::empty());
        let doubled = frame.map_histories(|_, h| {
            TickerHistory::new(h.adj_close.map_defined(|_, v| Some(v * 2.0)), None)
        });
        assert_eq!(doubled.len(), 2);
        assert_eq!(doubled.get("A").unwrap().adj_close.defined_values(), vec![2.0, 4.0]);
        assert!(doubled.get("B").unwrap().is_empty());
    }

    #[test]
    fn volume_with_only_gaps_does_not_count() {
        let h = TickerHistory::new(
            TimeSeries::daily(d(1), &[1.0]),
            Some(TimeSeries::from_points(vec![(d(1), None)])),
        );
        assert!(!h.has_volume());
    }
}
