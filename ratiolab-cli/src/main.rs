//! RatioLab CLI: ratio analysis, downloads and cache management.
//!
//! Commands:
//! - `analyze`: compare a main ticker against up to six others
//! - `download`: fetch history from Yahoo Finance into the Parquet cache
//! - `tickers`: list the selectable universe
//! - `cache status`: report cached tickers, date ranges and sizes

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use ratiolab_core::analysis::{CclSource, FillPolicy, PercentileSet, RatioMode};
use ratiolab_core::data::{
    fetch_frame, CachedProvider, NoProgress, ParquetCache, StdoutProgress, Universe, YahooProvider,
};
use ratiolab_runner::{
    build_provider, export_json, export_report, run_analysis, AnalysisConfig, AnalysisReport,
    DataSourceKind,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ratiolab",
    about = "RatioLab CLI: price ratios between MERVAL tickers"
)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute ratios of a main ticker against comparison tickers.
    Analyze(AnalyzeArgs),
    /// Download history from Yahoo Finance into the Parquet cache.
    Download {
        /// Tickers to download (e.g., GGAL.BA YPFD.BA YPF).
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Start date (YYYY-MM-DD). Defaults to 5 years ago.
        #[arg(long)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Force re-download even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// List the tickers offered for selection.
    Tickers {
        /// Universe TOML file. Defaults to the built-in MERVAL list.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Only list this group.
        #[arg(long)]
        group: Option<String>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached tickers, date ranges and sizes.
    Status {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Price,
    PriceVolume,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Yahoo,
    Csv,
    Synthetic,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// TOML request file; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Main ticker (e.g., GGAL.BA). Required without --config.
    main: Option<String>,

    /// Comparison tickers, up to six.
    #[arg(long = "compare", short = 'c', num_args = 1..)]
    comparisons: Vec<String>,

    /// Start date (YYYY-MM-DD). Defaults to one year ago.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Reference date for the percentage view. Defaults to the start date.
    #[arg(long)]
    reference: Option<NaiveDate>,

    /// Plot raw ratios instead of percent change from the reference.
    #[arg(long, default_value_t = false)]
    raw: bool,

    /// Logarithmic y axis (ignored in percentage mode).
    #[arg(long, default_value_t = false)]
    log: bool,

    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// SMA window.
    #[arg(long)]
    window: Option<usize>,

    /// Band window. Defaults to the SMA window.
    #[arg(long)]
    band_window: Option<usize>,

    /// Band width in standard deviations.
    #[arg(long)]
    k: Option<f64>,

    /// Carry the last value over missing dates.
    #[arg(long, default_value_t = false)]
    forward_fill: bool,

    /// 5/25/50/75/95 percentile markers instead of quartiles.
    #[arg(long, default_value_t = false)]
    extended_percentiles: bool,

    /// Histogram bins.
    #[arg(long)]
    bins: Option<usize>,

    /// Normalize peso prices by the implied CCL rate (YPFD.BA / YPF).
    #[arg(long, default_value_t = false)]
    ccl: bool,

    #[arg(long, value_enum)]
    source: Option<SourceArg>,

    /// Cache directory for Yahoo data.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Directory of {TICKER}.csv files for --source csv.
    #[arg(long)]
    csv_dir: Option<PathBuf>,

    /// Bypass the cache and re-download.
    #[arg(long, default_value_t = false)]
    refresh: bool,

    /// Seed for --source synthetic.
    #[arg(long)]
    seed: Option<u64>,

    /// Write ratios.csv, ratios.parquet, chart.json and report.json here.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the full report as JSON instead of the summary.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Analyze(args) => run_analyze(args),
        Commands::Download {
            tickers,
            start,
            end,
            force,
            cache_dir,
        } => run_download(tickers, start, end, force, cache_dir),
        Commands::Tickers { universe, group } => run_tickers(universe.as_deref(), group.as_deref()),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
        },
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn build_config(args: &AnalyzeArgs) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => {
            let Some(main) = &args.main else {
                bail!("a main ticker is required (or pass --config)");
            };
            let end = args.end.unwrap_or_else(today);
            let start = args.start.unwrap_or(end - chrono::Duration::days(365));
            AnalysisConfig::new(main.clone(), Vec::new(), start, end)
        }
    };

    if let Some(main) = &args.main {
        config.main = main.clone();
    }
    if !args.comparisons.is_empty() {
        config.comparisons = args.comparisons.clone();
    }
    if let Some(start) = args.start {
        config.start = start;
    }
    if let Some(end) = args.end {
        config.end = end;
    }
    if args.reference.is_some() {
        config.reference_date = args.reference;
    }
    if args.raw {
        config.percentage = false;
    }
    if args.log {
        config.log_scale = true;
    }
    if let Some(mode) = args.mode {
        config.mode = match mode {
            ModeArg::Price => RatioMode::PriceRatio,
            ModeArg::PriceVolume => RatioMode::PriceVolumeRatio,
        };
    }
    if let Some(window) = args.window {
        config.stats.window = window;
    }
    if args.band_window.is_some() {
        config.stats.band_window = args.band_window;
    }
    if let Some(k) = args.k {
        config.stats.band_multiplier = k;
    }
    if args.forward_fill {
        config.fill = FillPolicy::ForwardFill;
    }
    if args.extended_percentiles {
        config.stats.percentiles = PercentileSet::Extended;
    }
    if let Some(bins) = args.bins {
        config.stats.histogram_bins = bins;
    }
    if args.ccl && config.ccl.is_none() {
        config.ccl = Some(CclSource::default());
    }
    if let Some(source) = args.source {
        config.data.source = match source {
            SourceArg::Yahoo => DataSourceKind::Yahoo,
            SourceArg::Csv => DataSourceKind::Csv,
            SourceArg::Synthetic => DataSourceKind::Synthetic,
        };
    }
    if let Some(dir) = &args.cache_dir {
        config.data.cache_dir = dir.clone();
    }
    if let Some(dir) = &args.csv_dir {
        config.data.csv_dir = dir.clone();
    }
    if args.refresh {
        config.data.force_refresh = true;
    }
    if let Some(seed) = args.seed {
        config.data.seed = seed;
    }
    Ok(config)
}

fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let config = build_config(&args)?;
    tracing::debug!(
        main = %config.main,
        comparisons = ?config.comparisons,
        source = %config.data.source,
        "analysis request"
    );
    let provider = build_provider(&config.data).context("failed to set up data source")?;

    let report = if args.json {
        run_analysis(&config, provider.as_ref(), &NoProgress)?
    } else {
        run_analysis(&config, provider.as_ref(), &StdoutProgress)?
    };

    let saved = match &args.output {
        Some(output) => Some(export_report(&report, output)?.dir),
        None => None,
    };

    if args.json {
        write_json_report(
            &report,
            saved.as_deref(),
            &mut std::io::stdout().lock(),
            &mut std::io::stderr().lock(),
        )?;
    } else {
        print_summary(&report);
        if let Some(dir) = &saved {
            println!("Artifacts saved to: {}", dir.display());
        }
    }
    Ok(())
}

/// Stdout carries only the JSON document; the export note goes to `err`.
fn write_json_report(
    report: &AnalysisReport,
    saved: Option<&Path>,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<()> {
    writeln!(out, "{}", export_json(report)?)?;
    if let Some(dir) = saved {
        writeln!(err, "Artifacts saved to: {}", dir.display())?;
    }
    Ok(())
}

fn run_download(
    tickers: Vec<String>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    force: bool,
    cache_dir: PathBuf,
) -> Result<()> {
    let end = end.unwrap_or_else(today);
    let start = start.unwrap_or(end - chrono::Duration::days(365 * 5));
    if end < start {
        bail!("end date {end} is before start date {start}");
    }

    let tickers: Vec<String> = tickers
        .iter()
        .map(|t| ratiolab_core::domain::normalize_ticker(t))
        .collect::<Result<_, _>>()?;
    let refs: Vec<&str> = tickers.iter().map(String::as_str).collect();

    let provider = CachedProvider::new(YahooProvider::new()?, ParquetCache::new(&cache_dir))
        .with_force_refresh(force);
    let fetched = fetch_frame(&provider, &refs, start, end, &StdoutProgress);

    if !fetched.all_succeeded() {
        for warning in fetched.warnings.iter() {
            eprintln!("Error: {warning}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_tickers(universe: Option<&Path>, group: Option<&str>) -> Result<()> {
    let universe = match universe {
        Some(path) => Universe::from_file(path)?,
        None => Universe::default_merval(),
    };

    match group {
        Some(name) => {
            let Some(tickers) = universe.group_tickers(name) else {
                bail!(
                    "unknown group '{name}' (available: {})",
                    universe.group_names().join(", ")
                );
            };
            println!("{}", tickers.join(" "));
        }
        None => {
            for name in universe.group_names() {
                let tickers = universe.group_tickers(name).unwrap_or_default();
                println!("{name} ({}):", tickers.len());
                println!("  {}", tickers.join(" "));
            }
            println!();
            println!(
                "{} tickers, {} quoted in pesos",
                universe.ticker_count(),
                universe.local_tickers().len()
            );
        }
    }
    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = ParquetCache::new(cache_dir);
    let tickers = cache.cached_tickers();
    if tickers.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let refs: Vec<&str> = tickers.iter().map(String::as_str).collect();
    let statuses = cache.status(&refs);
    let sizes: Vec<u64> = tickers
        .iter()
        .map(|t| dir_size(&cache.cache_dir().join(format!("ticker={t}"))))
        .collect();

    println!("Cache: {}", cache_dir.display());
    println!("Tickers: {}", tickers.len());
    println!("Total size: {}", format_size(sizes.iter().sum()));
    println!();
    println!("{:<10} {:<25} {:<12} {:>10}", "Ticker", "Date Range", "Rows", "Size");
    println!("{}", "-".repeat(60));
    for (status, size) in statuses.iter().zip(&sizes) {
        let range = match (status.start_date, status.end_date) {
            (Some(s), Some(e)) => format!("{s} to {e}"),
            _ => "(no meta)".into(),
        };
        let rows = status.row_count.map_or_else(String::new, |n| format!("{n} rows"));
        println!(
            "{:<10} {:<25} {:<12} {:>10}",
            status.ticker,
            range,
            rows,
            format_size(*size)
        );
    }
    Ok(())
}

fn dir_size(path: &Path) -> u64 {
    std::fs::read_dir(path)
        .map(|entries| {
            entries
                .flatten()
                .filter_map(|e| e.metadata().ok())
                .map(|m| m.len())
                .sum()
        })
        .unwrap_or(0)
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn fmt_value(v: Option<f64>) -> String {
    v.map_or_else(|| "-".into(), |x| format!("{x:.4}"))
}

fn print_summary(report: &AnalysisReport) {
    let cfg = &report.config;
    println!();
    println!("=== Ratio Analysis ===");
    println!("Main:        {}", cfg.main);
    println!("Period:      {} to {}", cfg.start, cfg.end);
    println!("Y axis:      {}", report.chart.y_axis.title);
    if cfg.percentage {
        println!("Reference:   {}", report.reference_date);
    }
    println!(
        "Window:      SMA {} / bands {} at {}σ",
        cfg.stats.window,
        cfg.stats.band_window(),
        cfg.stats.band_multiplier
    );
    println!("Run ID:      {}", report.short_id());
    println!();

    if report.pairs.is_empty() {
        println!("No pairs to plot.");
    } else {
        println!(
            "{:<20} {:<15} {:>7} {:>12} {:>12} {:>12}",
            "Pair", "Mode", "Points", "Last", "SMA", "Reference"
        );
        println!("{}", "-".repeat(83));
        for p in &report.pairs {
            let last = p.plotted.values().last().copied().flatten();
            let sma = p.stats.sma.values().last().copied().flatten();
            let reference = p
                .reference
                .map_or_else(|| "-".into(), |r| r.resolved.to_string());
            println!(
                "{:<20} {:<15} {:>7} {:>12} {:>12} {:>12}",
                p.label(),
                p.mode.label(),
                p.valid_points,
                fmt_value(last),
                fmt_value(sma),
                reference
            );
        }
    }

    if let Some(h) = report.histogram.as_ref().filter(|h| !h.is_empty()) {
        println!();
        println!("--- Dispersion from SMA ({} points) ---", h.points());
        for m in &h.markers {
            println!("P{:<4} {:>12.4}", m.level, m.value);
        }
    }

    let skipped = report.skipped();
    if !skipped.is_empty() {
        println!();
        println!("Skipped: {}", skipped.join(", "));
    }
    for warning in report.warnings.iter() {
        println!("WARNING: {warning}");
    }
    println!();
}
