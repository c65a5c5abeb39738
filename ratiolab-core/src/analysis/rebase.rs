//! Rebasing a ratio series to percent change from a reference date.
//!
//! Each series resolves its own reference. A date that is not in the series
//! resolves to the nearest date carrying a value; on an exact tie the earlier
//! date wins. Dates outside the range therefore resolve to an endpoint.

use super::warning::Warning;
use crate::domain::TimeSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The reference date actually used for one series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub requested: NaiveDate,
    pub resolved: NaiveDate,
    pub value: f64,
}

impl ResolvedReference {
    /// True when the requested date had to be replaced.
    pub fn substituted(&self) -> bool {
        self.requested != self.resolved
    }

    /// Warning to report when the date was replaced.
    pub fn substitution_warning(&self, pair: &str) -> Option<Warning> {
        self.substituted().then(|| Warning::ReferenceSubstituted {
            pair: pair.to_string(),
            requested: self.requested,
            resolved: self.resolved,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RebaseError {
    #[error("series has no values to rebase")]
    EmptySeries,

    #[error("reference value {value} at {date} cannot be used as a base")]
    InvalidReferenceValue { date: NaiveDate, value: f64 },
}

/// A rebased series together with its reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Rebased {
    pub series: TimeSeries,
    pub reference: ResolvedReference,
}

/// Find the reference point for `requested` in `series`.
pub fn resolve_reference(
    series: &TimeSeries,
    requested: NaiveDate,
) -> Result<ResolvedReference, RebaseError> {
    let (resolved, value) = series
        .defined()
        .min_by_key(|(date, _)| ((*date - requested).num_days().abs(), *date))
        .ok_or(RebaseError::EmptySeries)?;

    if value == 0.0 || !value.is_finite() {
        return Err(RebaseError::InvalidReferenceValue {
            date: resolved,
            value,
        });
    }

    Ok(ResolvedReference {
        requested,
        resolved,
        value,
    })
}

/// Express every defined value as percent change from the reference value.
pub fn rebase_with(series: &TimeSeries, reference: &ResolvedReference) -> TimeSeries {
    series.map_defined(|_, v| Some((v / reference.value - 1.0) * 100.0))
}

/// Resolve the reference for `requested`, then rebase.
pub fn rebase(series: &TimeSeries, requested: NaiveDate) -> Result<Rebased, RebaseError> {
    let reference = resolve_reference(series, requested)?;
    Ok(Rebased {
        series: rebase_with(series, &reference),
        reference,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[test]
    fn rebases_around_reference() {
        let s = TimeSeries::daily(d(1), &[2.0, 4.0, 2.0]);
        let out = rebase(&s, d(2)).unwrap();
        assert_eq!(out.series.defined_values(), vec![-50.0, 0.0, -50.0]);
        assert!(!out.reference.substituted());
    }

    #[test]
    fn missing_date_resolves_to_nearest() {
        let s = TimeSeries::from_points(vec![(d(3), Some(1.0)), (d(10), Some(2.0))]);
        let r = resolve_reference(&s, d(5)).unwrap();
        assert_eq!(r.resolved, d(3));
        assert!(r.substituted());
        assert!(r.substitution_warning("A/B").is_some());
    }

    #[test]
    fn tie_resolves_to_earlier_date() {
        let s = TimeSeries::from_points(vec![(d(3), Some(1.0)), (d(7), Some(2.0))]);
        let r = resolve_reference(&s, d(5)).unwrap();
        assert_eq!(r.resolved, d(3));
    }

    #[test]
    fn out_of_range_resolves_to_endpoints() {
        let s = TimeSeries::daily(d(10), &[1.0, 2.0, 3.0]);
        assert_eq!(resolve_reference(&s, d(1)).unwrap().resolved, d(10));
        assert_eq!(resolve_reference(&s, d(30)).unwrap().resolved, d(12));
    }

    #[test]
    fn absent_points_are_not_candidates() {
        let s = TimeSeries::from_points(vec![(d(1), Some(1.0)), (d(2), None), (d(4), Some(2.0))]);
        let r = resolve_reference(&s, d(2)).unwrap();
        assert_eq!(r.resolved, d(1));
    }

    #[test]
    fn zero_reference_is_an_error() {
        let s = TimeSeries::daily(d(1), &[0.0, 1.0]);
        let err = rebase(&s, d(1)).unwrap_err();
        assert!(matches!(err, RebaseError::InvalidReferenceValue { .. }));
    }

    #[test]
    fn empty_series_is_an_error() {
        let s = TimeSeries::from_points(vec![(d(1), None)]);
        assert_eq!(rebase(&s, d(1)).unwrap_err(), RebaseError::EmptySeries);
    }

    #[test]
    fn absent_points_stay_absent() {
        let s = TimeSeries::from_points(vec![(d(1), Some(1.0)), (d(2), None)]);
        let out = rebase(&s, d(1)).unwrap();
        assert_eq!(out.series.values(), &[Some(0.0), None]);
    }
}
