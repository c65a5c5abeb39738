//! Analysis runner: fetch, normalize, run every pair through the pipeline
//! and describe the chart.
//!
//! Pairs only read the shared frame, so they are computed in parallel and
//! collected back in request order. A pair that cannot be computed is
//! skipped with a warning; only an unusable main ticker or an invalid
//! reference value aborts the whole analysis.

use std::collections::BTreeMap;

use rayon::prelude::*;
use thiserror::Error;

use ratiolab_core::analysis::{
    align_pair, dispersion_histogram, implied_ccl, longest_run, normalize_by_ccl, ratio, rebase,
    rolling_stats, window_fits, CclSource, DispersionHistogram, Pair, RebaseError, Warning,
    WarningLog,
};
use ratiolab_core::data::{fetch_frame, DataProvider, DataSource, FetchProgress, FetchedFrame};
use ratiolab_core::domain::{is_merval_ticker, TickerFrame, TimeSeries};

use crate::chart::build_chart;
use crate::config::{AnalysisConfig, ConfigError};
use crate::result::{AnalysisReport, PairAnalysis, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("main ticker {ticker} has no data: {reason}")]
    MainTickerUnavailable { ticker: String, reason: String },

    #[error("cannot rebase {pair}: {source}")]
    InvalidReference {
        pair: String,
        #[source]
        source: RebaseError,
    },
}

/// Run one analysis end to end.
pub fn run_analysis(
    config: &AnalysisConfig,
    provider: &dyn DataProvider,
    progress: &dyn FetchProgress,
) -> Result<AnalysisReport, AnalysisError> {
    let mut config = config.clone();
    let mut warnings = WarningLog::new();
    config.validate(&mut warnings)?;

    let mut tickers: Vec<&str> = vec![config.main.as_str()];
    tickers.extend(config.comparisons.iter().map(String::as_str));
    let FetchedFrame {
        frame,
        warnings: fetch_warnings,
        mut sources,
        ..
    } = fetch_frame(provider, &tickers, config.start, config.end, progress);
    warnings.absorb(fetch_warnings);

    if main_is_empty(&frame, &config.main) {
        let reason = warnings
            .iter()
            .find_map(|w| match w {
                Warning::DataUnavailable { ticker, reason } if *ticker == config.main => {
                    Some(reason.clone())
                }
                _ => None,
            })
            .unwrap_or_else(|| "no prices in range".into());
        return Err(AnalysisError::MainTickerUnavailable {
            ticker: config.main.clone(),
            reason,
        });
    }

    let frame = match &config.ccl {
        Some(ccl) => {
            let (frame, ccl_sources) =
                apply_ccl(frame, ccl, &config, provider, progress, &mut warnings);
            sources.extend(ccl_sources);
            if main_is_empty(&frame, &config.main) {
                return Err(AnalysisError::MainTickerUnavailable {
                    ticker: config.main.clone(),
                    reason: format!("no prices left after dividing by {}/{}", ccl.local, ccl.foreign),
                });
            }
            frame
        }
        None => frame,
    };

    let pairs: Vec<Pair> = config
        .comparisons
        .iter()
        .map(|c| Pair::new(config.main.clone(), c.clone()))
        .collect();

    let outcomes: Vec<(Result<Option<PairAnalysis>, AnalysisError>, WarningLog)> = pairs
        .par_iter()
        .map(|pair| {
            let mut log = WarningLog::new();
            let outcome = analyze_pair(&frame, pair, &config, &mut log);
            (outcome, log)
        })
        .collect();

    let mut analyses = Vec::with_capacity(outcomes.len());
    for (outcome, log) in outcomes {
        warnings.absorb(log);
        if let Some(analysis) = outcome? {
            analyses.push(analysis);
        }
    }

    let histogram = single_pair_histogram(&config, &analyses, &mut warnings);
    let chart = build_chart(
        &config.main,
        &analyses,
        histogram.as_ref(),
        config.percentage,
        config.log_scale,
        &mut warnings,
    );

    tracing::info!(
        main = %config.main,
        pairs = analyses.len(),
        skipped = config.comparisons.len() - analyses.len(),
        warnings = warnings.len(),
        "analysis complete"
    );

    Ok(AnalysisReport {
        schema_version: SCHEMA_VERSION,
        fingerprint: config.fingerprint(),
        reference_date: config.reference_date(),
        pairs: analyses,
        histogram,
        chart,
        warnings,
        sources,
        config,
    })
}

/// Run one pair through align → ratio → rebase → rolling statistics.
///
/// `Ok(None)` means the pair was skipped; the reason is in `warnings`.
pub fn analyze_pair(
    frame: &TickerFrame,
    pair: &Pair,
    config: &AnalysisConfig,
    warnings: &mut WarningLog,
) -> Result<Option<PairAnalysis>, AnalysisError> {
    let aligned = match align_pair(frame, pair, config.mode, config.fill, warnings) {
        Ok(aligned) => aligned,
        Err(issue) => {
            warnings.push(issue.to_warning(pair));
            return Ok(None);
        }
    };

    let ratio = ratio(&aligned, warnings);

    let (plotted, reference) = if config.percentage {
        let rebased = rebase(&ratio.series, config.reference_date()).map_err(|source| {
            AnalysisError::InvalidReference {
                pair: pair.label(),
                source,
            }
        })?;
        if let Some(w) = rebased.reference.substitution_warning(&pair.label()) {
            warnings.push(w);
        }
        (rebased.series, Some(rebased.reference))
    } else {
        (ratio.series.clone(), None)
    };

    let window = config.stats.window;
    let band_window = config.stats.band_window();
    check_window(&plotted, window, pair, warnings);
    if band_window != window {
        check_window(&plotted, band_window, pair, warnings);
    }
    let stats = rolling_stats(&plotted, window, band_window, config.stats.band_multiplier);

    tracing::debug!(
        pair = %pair,
        mode = aligned.mode.label(),
        valid = aligned.mask.count(),
        excluded = ratio.excluded,
        "pair computed"
    );

    Ok(Some(PairAnalysis {
        pair: pair.clone(),
        mode: aligned.mode,
        valid_points: aligned.mask.count(),
        excluded_points: ratio.excluded,
        ratio: ratio.series,
        reference,
        plotted,
        stats,
    }))
}

fn check_window(series: &TimeSeries, window: usize, pair: &Pair, warnings: &mut WarningLog) {
    if !window_fits(series, window) {
        warnings.push(Warning::InsufficientWindow {
            pair: pair.label(),
            window,
            longest_run: longest_run(series),
        });
    }
}

/// The dispersion histogram, drawn only for a single comparison.
fn single_pair_histogram(
    config: &AnalysisConfig,
    analyses: &[PairAnalysis],
    warnings: &mut WarningLog,
) -> Option<DispersionHistogram> {
    let [analysis] = analyses else {
        return None;
    };
    if config.comparisons.len() != 1 {
        return None;
    }
    let histogram = dispersion_histogram(
        &analysis.plotted,
        &analysis.stats.sma,
        config.stats.percentiles,
        config.stats.histogram_bins,
    );
    if histogram.is_empty() {
        warnings.push(Warning::EmptyHistogram {
            pair: analysis.label(),
            points: histogram.points(),
        });
    }
    Some(histogram)
}

fn main_is_empty(frame: &TickerFrame, main: &str) -> bool {
    frame.get(main).map_or(true, |h| h.is_empty())
}

/// Divide every peso price by the implied CCL rate.
///
/// Only Buenos Aires listings are converted; foreign listings are already in
/// dollars. When the rate cannot be built the frame is returned unchanged
/// with a `CclUnavailable` warning.
fn apply_ccl(
    frame: TickerFrame,
    ccl: &CclSource,
    config: &AnalysisConfig,
    provider: &dyn DataProvider,
    progress: &dyn FetchProgress,
    warnings: &mut WarningLog,
) -> (TickerFrame, BTreeMap<String, DataSource>) {
    let fetched = fetch_frame(
        provider,
        &[ccl.local.as_str(), ccl.foreign.as_str()],
        config.start,
        config.end,
        progress,
    );

    let (Some(local), Some(foreign)) = (
        fetched.frame.get(&ccl.local).filter(|h| !h.is_empty()),
        fetched.frame.get(&ccl.foreign).filter(|h| !h.is_empty()),
    ) else {
        let reason = fetched
            .warnings
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        warnings.push(Warning::CclUnavailable { reason });
        return (frame, BTreeMap::new());
    };

    let rate = implied_ccl(&local.adj_close, &foreign.adj_close, ccl.factor);
    if rate.is_all_missing() {
        warnings.push(Warning::CclUnavailable {
            reason: format!("{} and {} share no trading dates", ccl.local, ccl.foreign),
        });
        return (frame, BTreeMap::new());
    }

    tracing::info!(
        local = %ccl.local,
        foreign = %ccl.foreign,
        points = rate.defined_count(),
        "prices normalized by implied CCL"
    );
    let normalized = frame.map_histories(|ticker, h| {
        if is_merval_ticker(ticker) {
            normalize_by_ccl(h, &rate)
        } else {
            h.clone()
        }
    });
    (normalized, fetched.sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ratiolab_core::domain::TickerHistory;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, day).unwrap()
    }

    fn frame(entries: &[(&str, &[f64])]) -> TickerFrame {
        let mut frame = TickerFrame::new();
        for (ticker, prices) in entries {
            frame.insert(*ticker, TickerHistory::new(TimeSeries::daily(d(1), prices), None));
        }
        frame
    }

    fn config(percentage: bool, window: usize) -> AnalysisConfig {
        let mut cfg = AnalysisConfig::new("A", vec!["B".into()], d(1), d(3));
        cfg.percentage = percentage;
        cfg.stats.window = window;
        cfg.reference_date = Some(d(2));
        cfg
    }

    #[test]
    fn scenario_pair_end_to_end() {
        let frame = frame(&[("A", &[10.0, 20.0, 30.0]), ("B", &[5.0, 5.0, 15.0])]);
        let mut warnings = WarningLog::new();
        let analysis = analyze_pair(&frame, &Pair::new("A", "B"), &config(true, 2), &mut warnings)
            .unwrap()
            .unwrap();

        assert_eq!(analysis.ratio.defined_values(), vec![2.0, 4.0, 2.0]);
        assert_eq!(analysis.plotted.defined_values(), vec![-50.0, 0.0, -50.0]);
        assert_eq!(analysis.stats.sma.values(), &[None, Some(-25.0), Some(-25.0)]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn raw_mode_has_no_reference() {
        let frame = frame(&[("A", &[10.0, 20.0, 30.0]), ("B", &[5.0, 5.0, 15.0])]);
        let analysis = analyze_pair(&frame, &Pair::new("A", "B"), &config(false, 2), &mut WarningLog::new())
            .unwrap()
            .unwrap();
        assert!(analysis.reference.is_none());
        assert_eq!(analysis.stats.sma.values(), &[None, Some(3.0), Some(3.0)]);
    }

    #[test]
    fn missing_comparison_is_skipped() {
        let frame = frame(&[("A", &[10.0, 20.0])]);
        let mut warnings = WarningLog::new();
        let out = analyze_pair(&frame, &Pair::new("A", "B"), &config(true, 2), &mut warnings).unwrap();
        assert!(out.is_none());
        assert!(matches!(
            warnings.iter().next(),
            Some(Warning::DataUnavailable { ticker, .. }) if ticker == "B"
        ));
    }

    #[test]
    fn short_series_warns_about_window() {
        let frame = frame(&[("A", &[10.0, 20.0, 30.0]), ("B", &[5.0, 5.0, 15.0])]);
        let mut warnings = WarningLog::new();
        let analysis = analyze_pair(&frame, &Pair::new("A", "B"), &config(false, 20), &mut warnings)
            .unwrap()
            .unwrap();
        assert!(analysis.stats.sma.is_all_missing());
        assert_eq!(analysis.stats.sma.len(), 3);
        assert!(matches!(
            warnings.iter().next(),
            Some(Warning::InsufficientWindow { window: 20, longest_run: 3, .. })
        ));
    }

    #[test]
    fn zero_reference_aborts() {
        let frame = frame(&[("A", &[0.0, 0.0, 30.0]), ("B", &[5.0, 5.0, 15.0])]);
        let err = analyze_pair(&frame, &Pair::new("A", "B"), &config(true, 2), &mut WarningLog::new())
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidReference {
                source: RebaseError::InvalidReferenceValue { .. },
                ..
            }
        ));
    }
}
