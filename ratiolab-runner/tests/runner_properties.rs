//! Property tests for request handling.
//!
//! 1. Pairs come back in request order with five traces each
//! 2. More than six distinct comparisons are always rejected
//! 3. Ticker case never changes the fingerprint

use chrono::NaiveDate;
use proptest::prelude::*;

use ratiolab_core::data::{NoProgress, SyntheticProvider};
use ratiolab_runner::{run_analysis, AnalysisConfig, AnalysisError, ConfigError};

const POOL: [&str; 9] = [
    "YPFD.BA", "PAMP.BA", "BMA.BA", "TXAR.BA", "ALUA.BA", "CEPU.BA", "TGSU2.BA", "CRES.BA",
    "EDN.BA",
];

fn config(comparisons: Vec<String>) -> AnalysisConfig {
    AnalysisConfig::new(
        "GGAL.BA",
        comparisons,
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
    )
}

fn arb_comparisons(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(POOL.to_vec(), 0..=max)
        .prop_shuffle()
        .prop_map(|v| v.into_iter().map(String::from).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn pairs_follow_request_order(comparisons in arb_comparisons(6), seed in 0u64..1_000) {
        let report = run_analysis(&config(comparisons.clone()), &SyntheticProvider::new(seed), &NoProgress).unwrap();

        let others: Vec<&str> = report.pairs.iter().map(|p| p.pair.other.as_str()).collect();
        prop_assert_eq!(others, comparisons.iter().map(String::as_str).collect::<Vec<_>>());
        prop_assert_eq!(report.chart.traces.len(), 5 * comparisons.len());
        prop_assert_eq!(report.histogram.is_some(), comparisons.len() == 1);
    }

    #[test]
    fn more_than_six_is_rejected(extra in prop::sample::subsequence(POOL.to_vec(), 7..=9)) {
        let comparisons = extra.iter().map(|s| s.to_string()).collect();
        let err = run_analysis(&config(comparisons), &SyntheticProvider::new(1), &NoProgress).unwrap_err();
        let is_too_many = matches!(
            err,
            AnalysisError::Config(ConfigError::TooManyComparisons { max: 6, .. })
        );
        prop_assert!(is_too_many);
    }

    #[test]
    fn ticker_case_does_not_change_fingerprint(comparisons in arb_comparisons(6)) {
        let mut upper = config(comparisons.clone());
        let mut lower = config(comparisons.iter().map(|c| c.to_lowercase()).collect());
        lower.main = "ggal.ba".into();

        let mut warnings = ratiolab_core::analysis::WarningLog::new();
        upper.validate(&mut warnings).unwrap();
        lower.validate(&mut warnings).unwrap();
        prop_assert_eq!(upper.fingerprint(), lower.fingerprint());
    }
}
