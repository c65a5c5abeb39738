//! TimeSeries: dated values with explicit gaps.
//!
//! Dates are strictly increasing. A value may be absent (`None`) at a date
//! that is still part of the index. Non-finite inputs are stored as absent,
//! so NaN and infinity never travel past construction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered `(date, value)` pairs over a daily index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    dates: Vec<NaiveDate>,
    values: Vec<Option<f64>>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from unordered points.
    ///
    /// Points are sorted by date. When the same date appears more than once,
    /// the last occurrence wins.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, Option<f64>)>,
    {
        let mut by_date: BTreeMap<NaiveDate, Option<f64>> = BTreeMap::new();
        for (date, value) in points {
            by_date.insert(date, value.filter(|v| v.is_finite()));
        }
        let (dates, values) = by_date.into_iter().unzip();
        Self { dates, values }
    }

    /// Build a series of defined values on consecutive calendar days.
    pub fn daily(start: NaiveDate, values: &[f64]) -> Self {
        Self::from_points(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| (start + chrono::Duration::days(i as i64), Some(v))),
        )
    }

    /// Build a series from an already-sorted index and matching values.
    ///
    /// Used by the analysis stages, which always derive a new series from an
    /// existing sorted index.
    pub(crate) fn from_index(dates: Vec<NaiveDate>, values: Vec<Option<f64>>) -> Self {
        debug_assert_eq!(dates.len(), values.len());
        debug_assert!(dates.windows(2).all(|w| w[0] < w[1]));
        let values = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        Self { dates, values }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    /// Position of `date` in the index, if present.
    pub fn position(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Value at `date`; `None` if the date is not indexed or the value is absent.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.position(date).and_then(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Only the points that carry a value.
    pub fn defined(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.iter().filter_map(|(d, v)| v.map(|v| (d, v)))
    }

    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// True when the series has no defined value at all.
    pub fn is_all_missing(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Values of the defined points, in date order.
    pub fn defined_values(&self) -> Vec<f64> {
        self.values.iter().flatten().copied().collect()
    }

    /// Apply `f` to every defined value. A `None` or non-finite result
    /// becomes absent.
    pub fn map_defined<F>(&self, mut f: F) -> TimeSeries
    where
        F: FnMut(NaiveDate, f64) -> Option<f64>,
    {
        let values = self
            .iter()
            .map(|(d, v)| v.and_then(|v| f(d, v)))
            .collect();
        Self::from_index(self.dates.clone(), values)
    }

    /// Values looked up on another index; dates missing here are absent.
    pub fn reindex(&self, index: &[NaiveDate]) -> Vec<Option<f64>> {
        index.iter().map(|d| self.get(*d)).collect()
    }

    /// Restrict the index to `[start, end]` inclusive.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> TimeSeries {
        let (dates, values) = self
            .iter()
            .filter(|(d, _)| *d >= start && *d <= end)
            .unzip();
        Self { dates, values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn duplicates_resolve_last_write_wins() {
        let s = TimeSeries::from_points(vec![
            (d(2), Some(1.0)),
            (d(1), Some(5.0)),
            (d(2), Some(7.0)),
        ]);
        assert_eq!(s.dates(), &[d(1), d(2)]);
        assert_eq!(s.get(d(2)), Some(7.0));
    }

    #[test]
    fn non_finite_values_are_absent() {
        let s = TimeSeries::from_points(vec![
            (d(1), Some(f64::NAN)),
            (d(2), Some(f64::INFINITY)),
            (d(3), Some(1.5)),
        ]);
        assert_eq!(s.len(), 3);
        assert_eq!(s.defined_count(), 1);
        assert_eq!(s.get(d(1)), None);
    }

    #[test]
    fn reindex_marks_unknown_dates_absent() {
        let s = TimeSeries::daily(d(1), &[1.0, 2.0]);
        assert_eq!(s.reindex(&[d(2), d(9)]), vec![Some(2.0), None]);
    }

    #[test]
    fn between_is_inclusive() {
        let s = TimeSeries::daily(d(1), &[1.0, 2.0, 3.0, 4.0]);
        let cut = s.between(d(2), d(3));
        assert_eq!(cut.defined_values(), vec![2.0, 3.0]);
    }
}
