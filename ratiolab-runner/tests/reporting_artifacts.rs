//! Export artifacts: long-form CSV and Parquet, chart JSON, report JSON.

use chrono::NaiveDate;
use polars::prelude::*;

use ratiolab_core::data::{NoProgress, SyntheticProvider};
use ratiolab_runner::{
    export_json, export_report, import_json, ratio_rows, run_analysis, AnalysisConfig,
    AnalysisReport, ChartSpec, SCHEMA_VERSION,
};

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, day).unwrap()
}

fn synthetic_report(comparisons: &[&str]) -> AnalysisReport {
    let mut config = AnalysisConfig::new(
        "GGAL.BA",
        comparisons.iter().map(|c| c.to_string()).collect(),
        d(1, 1),
        d(6, 28),
    );
    config.reference_date = Some(d(3, 15));
    run_analysis(&config, &SyntheticProvider::new(11), &NoProgress).unwrap()
}

#[test]
fn rows_cover_every_pair_and_date() {
    let report = synthetic_report(&["YPFD.BA", "PAMP.BA"]);
    let rows = ratio_rows(&report.pairs);
    let expected: usize = report.pairs.iter().map(|p| p.ratio.len()).sum();
    assert_eq!(rows.len(), expected);

    let first = &rows[0];
    assert_eq!(first.pair, "GGAL.BA/YPFD.BA");
    assert!(first.ratio.is_some());
    assert!(first.sma.is_none());

    let at_reference = rows
        .iter()
        .find(|r| r.pair == "GGAL.BA/PAMP.BA" && r.date == d(3, 15))
        .unwrap();
    assert!(at_reference.value.unwrap().abs() < 1e-9);
}

#[test]
fn export_writes_all_four_files() {
    let report = synthetic_report(&["YPFD.BA"]);
    let out = tempfile::tempdir().unwrap();
    let paths = export_report(&report, out.path()).unwrap();

    assert_eq!(paths.dir, out.path().join(report.short_id()));
    for path in [&paths.csv, &paths.parquet, &paths.chart, &paths.report] {
        assert!(path.exists(), "{} missing", path.display());
    }

    // CSV: header plus one line per row, absent values as empty cells
    let csv = std::fs::read_to_string(&paths.csv).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("pair,date,ratio,value,sma,std,upper,lower")
    );
    let first = lines.next().unwrap();
    assert!(first.starts_with("GGAL.BA/YPFD.BA,2024-01-01,"));
    assert!(first.ends_with(",,,,"));
    assert_eq!(csv.lines().count(), ratio_rows(&report.pairs).len() + 1);

    // Parquet mirrors the CSV
    let file = std::fs::File::open(&paths.parquet).unwrap();
    let df = ParquetReader::new(file).finish().unwrap();
    assert_eq!(df.height(), ratio_rows(&report.pairs).len());
    assert_eq!(df.width(), 8);
    let dates = df.column("date").unwrap();
    assert_eq!(dates.dtype(), &DataType::Date);
    assert_eq!(
        dates.date().unwrap().get(0),
        Some((d(1, 1) - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()).num_days() as i32)
    );

    let chart: ChartSpec =
        serde_json::from_str(&std::fs::read_to_string(&paths.chart).unwrap()).unwrap();
    let names = |c: &ChartSpec| c.traces.iter().map(|t| t.name.clone()).collect::<Vec<_>>();
    assert_eq!(names(&chart), names(&report.chart));
    assert_eq!(chart.hlines.len(), report.chart.hlines.len());
    assert!(chart.histogram.is_some());
}

#[test]
fn re_export_overwrites_the_same_directory() {
    let report = synthetic_report(&["YPFD.BA"]);
    let out = tempfile::tempdir().unwrap();
    let a = export_report(&report, out.path()).unwrap();
    let b = export_report(&report, out.path()).unwrap();
    assert_eq!(a.dir, b.dir);
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 1);
}

#[test]
fn report_json_round_trips() {
    let report = synthetic_report(&["YPFD.BA"]);
    let json = export_json(&report).unwrap();
    let back = import_json(&json).unwrap();

    assert_eq!(back.schema_version, SCHEMA_VERSION);
    assert_eq!(back.fingerprint, report.fingerprint);
    assert_eq!(back.pairs.len(), report.pairs.len());
    assert_eq!(back.pairs[0].pair, report.pairs[0].pair);
    assert_eq!(back.pairs[0].ratio.dates(), report.pairs[0].ratio.dates());
    for (a, b) in back.pairs[0]
        .plotted
        .values()
        .iter()
        .zip(report.pairs[0].plotted.values())
    {
        match (a, b) {
            (Some(a), Some(b)) => assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0)),
            (a, b) => assert_eq!(a.is_some(), b.is_some()),
        }
    }
    assert_eq!(
        back.histogram.map(|h| h.markers.len()),
        report.histogram.as_ref().map(|h| h.markers.len())
    );
    assert_eq!(back.warnings.len(), report.warnings.len());
}

#[test]
fn newer_schema_is_rejected() {
    let report = synthetic_report(&["YPFD.BA"]);
    let mut value: serde_json::Value = serde_json::from_str(&export_json(&report).unwrap()).unwrap();
    value["schema_version"] = serde_json::json!(SCHEMA_VERSION + 1);

    let err = import_json(&value.to_string()).unwrap_err();
    assert!(err.to_string().contains("unsupported schema version"));
}
