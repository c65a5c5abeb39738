//! Property tests for the analysis stages.
//!
//! Uses proptest to verify:
//! 1. Ratio exactness: the ratio is the plain quotient on valid dates, absent elsewhere
//! 2. Rebase anchor: the rebased series is zero at the resolved reference
//! 3. Rebase round trip: `ratio = base * (rebased / 100 + 1)`
//! 4. SMA warm-up: absent for the first `window - 1` points, defined after
//! 5. Percentile ordering: quartile markers never cross

use chrono::NaiveDate;
use proptest::prelude::*;
use ratiolab_core::analysis::{
    align_pair, dispersion_histogram, ratio, rebase, rolling_std, sma, FillPolicy, Pair,
    PercentileSet, RatioMode, WarningLog,
};
use ratiolab_core::domain::{TickerFrame, TickerHistory, TimeSeries};

// ── Strategies (proptest) ────────────────────────────────────────────

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
}

fn arb_price() -> impl Strategy<Value = f64> {
    (0.01..5000.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

/// Prices with roughly one gap in five.
fn arb_gappy_prices(len: usize) -> impl Strategy<Value = Vec<Option<f64>>> {
    prop::collection::vec(prop::option::weighted(0.8, arb_price()), len)
}

fn series_of(values: &[Option<f64>]) -> TimeSeries {
    TimeSeries::from_points(
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (base_date() + chrono::Duration::days(i as i64), *v)),
    )
}

fn arb_pair_prices() -> impl Strategy<Value = (Vec<Option<f64>>, Vec<Option<f64>>)> {
    (1usize..80).prop_flat_map(|n| (arb_gappy_prices(n), arb_gappy_prices(n)))
}

// ── 1. Ratio exactness ───────────────────────────────────────────────

proptest! {
    #[test]
    fn ratio_is_exact_quotient_on_valid_dates((a, b) in arb_pair_prices()) {
        let mut frame = TickerFrame::new();
        frame.insert("A", TickerHistory::new(series_of(&a), None));
        frame.insert("B", TickerHistory::new(series_of(&b), None));

        let mut warnings = WarningLog::new();
        let pair = Pair::new("A", "B");
        let Ok(aligned) = align_pair(&frame, &pair, RatioMode::PriceRatio, FillPolicy::None, &mut warnings) else {
            // no common date
            return Ok(());
        };
        let r = ratio(&aligned, &mut warnings).series;

        for (i, (pa, pb)) in a.iter().zip(&b).enumerate() {
            let date = base_date() + chrono::Duration::days(i as i64);
            match (pa, pb) {
                (Some(pa), Some(pb)) => prop_assert_eq!(r.get(date), Some(pa / pb)),
                _ => prop_assert_eq!(r.get(date), None),
            }
        }
        prop_assert!(warnings.is_empty());
    }
}

// ── 2 & 3. Rebasing ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn rebase_is_zero_at_reference(
        values in prop::collection::vec(prop::option::weighted(0.8, arb_price()), 1..60),
        offset in -10i64..70,
    ) {
        let series = series_of(&values);
        prop_assume!(!series.is_all_missing());

        let requested = base_date() + chrono::Duration::days(offset);
        let rebased = rebase(&series, requested).unwrap();
        let at_ref = rebased.series.get(rebased.reference.resolved).unwrap();
        prop_assert!(at_ref.abs() < 1e-9);
        prop_assert_eq!(series.get(rebased.reference.resolved), Some(rebased.reference.value));
    }

    #[test]
    fn rebase_round_trips(
        values in prop::collection::vec(prop::option::weighted(0.8, arb_price()), 1..60),
        offset in 0i64..60,
    ) {
        let series = series_of(&values);
        prop_assume!(!series.is_all_missing());

        let rebased = rebase(&series, base_date() + chrono::Duration::days(offset)).unwrap();
        let base = rebased.reference.value;
        for (date, original) in series.iter() {
            match original {
                Some(v) => {
                    let pct = rebased.series.get(date).unwrap();
                    let back = base * (pct / 100.0 + 1.0);
                    prop_assert!((back - v).abs() <= 1e-9 * v.abs().max(1.0));
                }
                None => prop_assert_eq!(rebased.series.get(date), None),
            }
        }
    }
}

// ── 4. SMA warm-up ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn sma_prefix_is_absent_then_defined(
        values in prop::collection::vec(arb_price(), 1..100),
        window in 1usize..30,
    ) {
        let series = TimeSeries::daily(base_date(), &values);
        let out = sma(&series, window);
        prop_assert_eq!(out.len(), values.len());

        for (i, v) in out.values().iter().enumerate() {
            if i + 1 < window {
                prop_assert!(v.is_none());
            } else {
                prop_assert!(v.is_some_and(f64::is_finite));
            }
        }
    }

    #[test]
    fn window_longer_than_series_is_all_absent(
        values in prop::collection::vec(arb_price(), 0..20),
        extra in 1usize..10,
    ) {
        let series = TimeSeries::daily(base_date(), &values);
        let window = values.len() + extra;
        prop_assert!(sma(&series, window).is_all_missing());
        prop_assert!(rolling_std(&series, window).is_all_missing());
        prop_assert_eq!(sma(&series, window).len(), values.len());
    }
}

// ── 5. Percentile ordering ───────────────────────────────────────────

proptest! {
    #[test]
    fn quartile_markers_are_ordered(
        values in prop::collection::vec(arb_price(), 3..120),
        window in 1usize..5,
    ) {
        let series = TimeSeries::daily(base_date(), &values);
        let avg = sma(&series, window);
        let hist = dispersion_histogram(&series, &avg, PercentileSet::Extended, 20);
        prop_assume!(!hist.is_empty());

        let markers: Vec<f64> = hist.markers.iter().map(|m| m.value).collect();
        prop_assert!(markers.windows(2).all(|w| w[0] <= w[1]));

        let p25 = hist.marker(25.0).unwrap();
        let p50 = hist.marker(50.0).unwrap();
        let p75 = hist.marker(75.0).unwrap();
        prop_assert!(p25 <= p50 && p50 <= p75);
        prop_assert_eq!(hist.bins.iter().map(|b| b.count).sum::<usize>(), hist.points());
    }
}
