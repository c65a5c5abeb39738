//! Report export: long-form CSV and Parquet, chart JSON, full report JSON.
//!
//! Files land in `{output}/{short-id}/` where the id is a prefix of the
//! request fingerprint, so re-running an identical request overwrites its
//! own artifacts and nothing else.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use polars::prelude::*;

use crate::result::{AnalysisReport, PairAnalysis, SCHEMA_VERSION};

/// One row per (pair, date) of the long-form table.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioRow {
    pub pair: String,
    pub date: NaiveDate,
    pub ratio: Option<f64>,
    pub value: Option<f64>,
    pub sma: Option<f64>,
    pub std: Option<f64>,
    pub upper: Option<f64>,
    pub lower: Option<f64>,
}

/// Paths written by [`export_report`].
#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub dir: PathBuf,
    pub csv: PathBuf,
    pub parquet: PathBuf,
    pub chart: PathBuf,
    pub report: PathBuf,
}

/// Flatten every pair into rows. All series of a pair share the ratio's
/// index, so rows line up by position.
pub fn ratio_rows(pairs: &[PairAnalysis]) -> Vec<RatioRow> {
    pairs
        .iter()
        .flat_map(|p| {
            let label = p.label();
            let bands = &p.stats.bands;
            p.ratio
                .iter()
                .enumerate()
                .map(move |(i, (date, ratio))| RatioRow {
                    pair: label.clone(),
                    date,
                    ratio,
                    value: p.plotted.values().get(i).copied().flatten(),
                    sma: p.stats.sma.values().get(i).copied().flatten(),
                    std: bands.std.values().get(i).copied().flatten(),
                    upper: bands.upper.values().get(i).copied().flatten(),
                    lower: bands.lower.values().get(i).copied().flatten(),
                })
        })
        .collect()
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_default()
}

pub fn write_ratios_csv(path: &Path, rows: &[RatioRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create ratios CSV {}", path.display()))?;
    wtr.write_record(["pair", "date", "ratio", "value", "sma", "std", "upper", "lower"])?;
    for r in rows {
        wtr.write_record([
            r.pair.clone(),
            r.date.to_string(),
            fmt_opt(r.ratio),
            fmt_opt(r.value),
            fmt_opt(r.sma),
            fmt_opt(r.std),
            fmt_opt(r.upper),
            fmt_opt(r.lower),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_ratios_parquet(path: &Path, rows: &[RatioRow]) -> Result<()> {
    let column = |name: &str, f: fn(&RatioRow) -> Option<f64>| {
        Column::new(name.into(), rows.iter().map(f).collect::<Vec<_>>())
    };

    let mut df = DataFrame::new(vec![
        Column::new(
            "pair".into(),
            rows.iter().map(|r| r.pair.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            "date".into(),
            // days since 1970-01-01, the default date
            rows.iter()
                .map(|r| (r.date - NaiveDate::default()).num_days() as i32)
                .collect::<Vec<_>>(),
        )
        .cast(&DataType::Date)
        .context("Failed to cast ratio dates")?,
        column("ratio", |r| r.ratio),
        column("value", |r| r.value),
        column("sma", |r| r.sma),
        column("std", |r| r.std),
        column("upper", |r| r.upper),
        column("lower", |r| r.lower),
    ])
    .context("Failed to build ratios dataframe")?;

    let mut file = fs::File::create(path)
        .with_context(|| format!("Failed to create ratios parquet {}", path.display()))?;
    ParquetWriter::new(&mut file)
        .finish(&mut df)
        .context("Failed to write ratios parquet")?;
    Ok(())
}

pub fn export_json(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize AnalysisReport to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<AnalysisReport> {
    let report: AnalysisReport =
        serde_json::from_str(json).context("failed to deserialize AnalysisReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

/// Write all four artifacts under `output`.
pub fn export_report(report: &AnalysisReport, output: &Path) -> Result<ExportPaths> {
    let dir = output.join(report.short_id());
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create export dir {}", dir.display()))?;

    let paths = ExportPaths {
        csv: dir.join("ratios.csv"),
        parquet: dir.join("ratios.parquet"),
        chart: dir.join("chart.json"),
        report: dir.join("report.json"),
        dir,
    };

    let rows = ratio_rows(&report.pairs);
    write_ratios_csv(&paths.csv, &rows)?;
    write_ratios_parquet(&paths.parquet, &rows)?;

    let chart = serde_json::to_string_pretty(&report.chart).context("failed to serialize chart")?;
    fs::write(&paths.chart, chart)
        .with_context(|| format!("Failed to write {}", paths.chart.display()))?;
    fs::write(&paths.report, export_json(report)?)
        .with_context(|| format!("Failed to write {}", paths.report.display()))?;

    tracing::info!(dir = %paths.dir.display(), rows = rows.len(), "report exported");
    Ok(paths)
}
