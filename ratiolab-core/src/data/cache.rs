//! Parquet cache layer with Hive-style partitioning.
//!
//! Layout: `{cache_dir}/ticker={TICKER}/{year}.parquet`
//!
//! - Atomic writes (write to .tmp, rename into place)
//! - Corrupt files are quarantined as `{file}.quarantined` on load
//! - Metadata sidecar per ticker (hash, date range, covered requests, source)
//! - The sidecar is removed before partitions change and written last, so a
//!   failed write leaves the ticker uncached rather than half-covered
//!
//! [`CachedProvider`] puts the cache in front of any other provider.

use super::provider::{DataError, DataProvider, DataSource, FetchResult, Quote};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1970, 1, 1) {
    Some(d) => d,
    None => panic!("epoch is a valid date"),
};

/// Metadata sidecar for a cached ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub row_count: usize,
    /// Requested ranges that were fetched in full, merged and sorted.
    /// Rows outside these ranges may exist but are never served alone.
    #[serde(default)]
    pub covered: Vec<(NaiveDate, NaiveDate)>,
    pub data_hash: String,
    pub source: DataSource,
    pub cached_at: chrono::NaiveDateTime,
}

/// The Parquet cache.
pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn ticker_dir(&self, ticker: &str) -> PathBuf {
        self.cache_dir.join(format!("ticker={ticker}"))
    }

    fn year_path(&self, ticker: &str, year: i32) -> PathBuf {
        self.ticker_dir(ticker).join(format!("{year}.parquet"))
    }

    fn meta_path(&self, ticker: &str) -> PathBuf {
        self.ticker_dir(ticker).join("meta.json")
    }

    /// Replace the cached rows for a ticker.
    ///
    /// Rows are sorted and deduplicated (last wins), grouped by year and
    /// written one Parquet file per year. `covered` lists the requested
    /// ranges the rows answer in full.
    pub fn write(
        &self,
        ticker: &str,
        quotes: &[Quote],
        source: DataSource,
        covered: &[(NaiveDate, NaiveDate)],
    ) -> Result<(), DataError> {
        let rows: Vec<Quote> = quotes
            .iter()
            .map(|q| (q.date, *q))
            .collect::<BTreeMap<_, _>>()
            .into_values()
            .collect();

        let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
            return Err(DataError::CacheError("no rows to cache".into()));
        };
        let (start_date, end_date) = (first.date, last.date);

        let dir = self.ticker_dir(ticker);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;
        self.invalidate(ticker)?;

        let mut by_year: BTreeMap<i32, Vec<&Quote>> = BTreeMap::new();
        for q in &rows {
            by_year.entry(q.date.year()).or_default().push(q);
        }

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(by_year.len());
        for (year, year_rows) in &by_year {
            let path = self.year_path(ticker, *year);
            let tmp_path = path.with_extension("parquet.tmp");
            let written = quotes_to_dataframe(year_rows).and_then(|df| write_parquet(&df, &tmp_path));
            if let Err(e) = written {
                discard_tmp(&tmp_path);
                for (tmp, _) in &staged {
                    discard_tmp(tmp);
                }
                return Err(e);
            }
            staged.push((tmp_path, path));
        }

        // Partitions from an earlier, wider write
        let entries =
            fs::read_dir(&dir).map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;
        for entry in entries {
            let path = entry
                .map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?
                .path();
            let is_partition = path.extension().and_then(|e| e.to_str()) == Some("parquet");
            if is_partition && !staged.iter().any(|(_, target)| *target == path) {
                fs::remove_file(&path).map_err(|e| {
                    DataError::CacheError(format!("remove stale {}: {e}", path.display()))
                })?;
            }
        }

        for (tmp_path, path) in &staged {
            fs::rename(tmp_path, path)
                .map_err(|e| DataError::CacheError(format!("atomic rename failed: {e}")))?;
        }

        let meta = CacheMeta {
            ticker: ticker.to_string(),
            start_date,
            end_date,
            row_count: rows.len(),
            covered: merge_ranges(covered.to_vec()),
            data_hash: blake3::hash(
                &serde_json::to_vec(&rows)
                    .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            source,
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        let meta_path = self.meta_path(ticker);
        let meta_tmp = meta_path.with_extension("json.tmp");
        fs::write(&meta_tmp, meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;
        fs::rename(&meta_tmp, &meta_path)
            .map_err(|e| DataError::CacheError(format!("meta rename: {e}")))?;

        tracing::debug!(ticker, rows = rows.len(), %start_date, %end_date, "cache written");
        Ok(())
    }

    /// Drop the metadata sidecar so nothing is served for the ticker until
    /// the next complete write.
    fn invalidate(&self, ticker: &str) -> Result<(), DataError> {
        match fs::remove_file(self.meta_path(ticker)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DataError::CacheError(format!("invalidate meta: {e}"))),
        }
    }

    /// Load all cached rows for a ticker, sorted by date ascending.
    pub fn load(&self, ticker: &str) -> Result<Vec<Quote>, DataError> {
        let dir = self.ticker_dir(ticker);
        if !dir.exists() {
            return Err(DataError::NoCachedData {
                ticker: ticker.to_string(),
            });
        }

        let entries =
            fs::read_dir(&dir).map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        let mut rows = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }

            match load_and_validate_parquet(&path) {
                Ok(quotes) => rows.extend(quotes),
                Err(e) => {
                    let quarantine = path.with_extension("parquet.quarantined");
                    tracing::warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                    if let Err(e) = fs::rename(&path, &quarantine) {
                        tracing::warn!(path = %path.display(), error = %e, "quarantine failed");
                    }
                    // The recorded coverage no longer holds
                    self.invalidate(ticker)?;
                }
            }
        }

        if rows.is_empty() {
            return Err(DataError::NoCachedData {
                ticker: ticker.to_string(),
            });
        }

        rows.sort_by_key(|q| q.date);
        Ok(rows)
    }

    pub fn get_meta(&self, ticker: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(ticker)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Tickers that have a metadata sidecar, sorted.
    pub fn cached_tickers(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        let mut tickers: Vec<String> = entries
            .flatten()
            .filter_map(|e| {
                let name = e.file_name().into_string().ok()?;
                let ticker = name.strip_prefix("ticker=")?.to_string();
                self.meta_path(&ticker).exists().then_some(ticker)
            })
            .collect();
        tickers.sort();
        tickers
    }

    pub fn status(&self, tickers: &[&str]) -> Vec<CacheStatus> {
        tickers
            .iter()
            .map(|t| {
                let meta = self.get_meta(t);
                CacheStatus {
                    ticker: t.to_string(),
                    cached: meta.is_some(),
                    start_date: meta.as_ref().map(|m| m.start_date),
                    end_date: meta.as_ref().map(|m| m.end_date),
                    row_count: meta.as_ref().map(|m| m.row_count),
                }
            })
            .collect()
    }

    /// Whether `start..=end` lies inside one of the ranges recorded as
    /// fetched. Rows alone do not count: a gap between two fetches, or a
    /// weekend before the first trading day, is judged by what was asked for.
    pub fn covers_range(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> CoverageResult {
        match self.get_meta(ticker) {
            None => CoverageResult::NotCached,
            Some(meta) if meta.covered.iter().any(|(s, e)| *s <= start && end <= *e) => {
                CoverageResult::FullyCovered
            }
            Some(meta) => CoverageResult::PartiallyCovered {
                cached_start: meta.start_date,
                cached_end: meta.end_date,
            },
        }
    }
}

/// Cache status for a single ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub ticker: String,
    pub cached: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub row_count: Option<usize>,
}

/// How well the cache covers the requested date range.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageResult {
    NotCached,
    FullyCovered,
    PartiallyCovered {
        cached_start: NaiveDate,
        cached_end: NaiveDate,
    },
}

/// Serves fetches from the cache when it covers the range, otherwise asks
/// the upstream provider and merges the answer into the cache.
pub struct CachedProvider<P> {
    upstream: P,
    cache: ParquetCache,
    force_refresh: bool,
}

impl<P: DataProvider> CachedProvider<P> {
    pub fn new(upstream: P, cache: ParquetCache) -> Self {
        Self {
            upstream,
            cache,
            force_refresh: false,
        }
    }

    /// Always go upstream, even when the cache covers the range.
    pub fn with_force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub fn cache(&self) -> &ParquetCache {
        &self.cache
    }

    fn from_cache(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let quotes: Vec<Quote> = self
            .cache
            .load(ticker)?
            .into_iter()
            .filter(|q| q.date >= start && q.date <= end)
            .collect();
        if quotes.is_empty() {
            return Err(DataError::EmptyRange {
                ticker: ticker.to_string(),
                start,
                end,
            });
        }
        Ok(FetchResult {
            ticker: ticker.to_string(),
            quotes,
            source: DataSource::Cache,
        })
    }
}

impl<P: DataProvider> DataProvider for CachedProvider<P> {
    fn name(&self) -> &str {
        "cache"
    }

    fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        if !self.force_refresh
            && self.cache.covers_range(ticker, start, end) == CoverageResult::FullyCovered
        {
            match self.from_cache(ticker, start, end) {
                Ok(result) => {
                    tracing::debug!(ticker, rows = result.quotes.len(), "cache hit");
                    return Ok(result);
                }
                Err(e) => tracing::debug!(ticker, error = %e, "cache unusable, going upstream"),
            }
        }

        let fresh = self.upstream.fetch(ticker, start, end)?;

        // Fresh rows win over cached ones on the same date. Earlier coverage
        // is kept only when the earlier rows loaded.
        let (mut merged, mut covered) = match (self.cache.load(ticker), self.cache.get_meta(ticker)) {
            (Ok(rows), Some(meta)) => (rows, meta.covered),
            _ => (Vec::new(), Vec::new()),
        };
        merged.extend(fresh.quotes.iter().copied());
        covered.push((start, end));
        if let Err(e) = self.cache.write(ticker, &merged, fresh.source, &covered) {
            tracing::warn!(ticker, error = %e, "failed to update cache");
        }

        Ok(fresh)
    }
}

/// Sort ranges and join the ones that overlap or sit on consecutive days.
fn merge_ranges(mut ranges: Vec<(NaiveDate, NaiveDate)>) -> Vec<(NaiveDate, NaiveDate)> {
    ranges.retain(|(s, e)| s <= e);
    ranges.sort();
    let mut merged: Vec<(NaiveDate, NaiveDate)> = Vec::with_capacity(ranges.len());
    for (start, end) in ranges {
        match merged.last_mut() {
            Some(last) if last.1.succ_opt().map_or(true, |next| start <= next) => {
                last.1 = last.1.max(end);
            }
            _ => merged.push((start, end)),
        }
    }
    merged
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn discard_tmp(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "leftover temp file");
        }
    }
}

fn quotes_to_dataframe(quotes: &[&Quote]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = quotes
        .iter()
        .map(|q| (q.date - EPOCH).num_days() as i32)
        .collect();
    let adj_closes: Vec<Option<f64>> = quotes.iter().map(|q| q.adj_close).collect();
    let volumes: Vec<Option<f64>> = quotes.iter().map(|q| q.volume).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("adj_close".into(), adj_closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<Quote>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::CacheError("empty parquet file".into()));
    }
    for col_name in ["date", "adj_close", "volume"] {
        if df.column(col_name).is_err() {
            return Err(DataError::CacheError(format!("missing column '{col_name}'")));
        }
    }

    dataframe_to_quotes(&df)
}

fn dataframe_to_quotes(df: &DataFrame) -> Result<Vec<Quote>, DataError> {
    let map_err = |e: PolarsError| DataError::ParquetError(format!("column read: {e}"));

    let date_ca = df
        .column("date")
        .map_err(map_err)?
        .date()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;
    let adj_ca = df
        .column("adj_close")
        .map_err(map_err)?
        .f64()
        .map_err(|e| DataError::ParquetError(format!("adj_close column type: {e}")))?;
    let vol_ca = df
        .column("volume")
        .map_err(map_err)?
        .f64()
        .map_err(|e| DataError::ParquetError(format!("volume column type: {e}")))?;

    (0..df.height())
        .map(|i| {
            let days = date_ca
                .get(i)
                .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
            Ok(Quote {
                date: EPOCH + chrono::Duration::days(days as i64),
                adj_close: adj_ca.get(i),
                volume: vol_ca.get(i),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_quotes() -> Vec<Quote> {
        vec![
            Quote {
                date: d(2023, 12, 29),
                adj_close: Some(990.0),
                volume: Some(500.0),
            },
            Quote {
                date: d(2024, 1, 2),
                adj_close: Some(1_000.0),
                volume: None,
            },
            Quote {
                date: d(2024, 1, 3),
                adj_close: Some(1_010.0),
                volume: Some(700.0),
            },
        ]
    }

    fn sample_range() -> (NaiveDate, NaiveDate) {
        (d(2023, 12, 25), d(2024, 1, 3))
    }

    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl DataProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn fetch(
            &self,
            ticker: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<FetchResult, DataError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(FetchResult {
                ticker: ticker.to_string(),
                quotes: sample_quotes()
                    .into_iter()
                    .filter(|q| q.date >= start && q.date <= end)
                    .collect(),
                source: DataSource::Synthetic,
            })
        }
    }

    #[test]
    fn write_and_load_across_years() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());

        cache
            .write("GGAL.BA", &sample_quotes(), DataSource::YahooFinance, &[sample_range()])
            .unwrap();
        assert!(dir.path().join("ticker=GGAL.BA/2023.parquet").exists());
        assert!(dir.path().join("ticker=GGAL.BA/2024.parquet").exists());

        let loaded = cache.load("GGAL.BA").unwrap();
        assert_eq!(loaded, sample_quotes());
    }

    #[test]
    fn load_nonexistent_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        assert!(matches!(
            cache.load("NOPE.BA"),
            Err(DataError::NoCachedData { .. })
        ));
    }

    #[test]
    fn meta_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache
            .write("YPFD.BA", &sample_quotes(), DataSource::YahooFinance, &[sample_range()])
            .unwrap();

        let meta = cache.get_meta("YPFD.BA").unwrap();
        assert_eq!(meta.row_count, 3);
        assert_eq!(meta.start_date, d(2023, 12, 29));
        assert_eq!(meta.source, DataSource::YahooFinance);

        let statuses = cache.status(&["YPFD.BA", "PAMP.BA"]);
        assert!(statuses[0].cached);
        assert!(!statuses[1].cached);
        assert_eq!(cache.cached_tickers(), vec!["YPFD.BA".to_string()]);
    }

    #[test]
    fn coverage_check() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache
            .write("YPFD.BA", &sample_quotes(), DataSource::YahooFinance, &[sample_range()])
            .unwrap();

        assert_eq!(
            cache.covers_range("YPFD.BA", d(2024, 1, 2), d(2024, 1, 3)),
            CoverageResult::FullyCovered
        );
        // Starts before the first cached row but inside the requested range
        assert_eq!(
            cache.covers_range("YPFD.BA", d(2023, 12, 25), d(2024, 1, 1)),
            CoverageResult::FullyCovered
        );
        assert_eq!(
            cache.covers_range("YPFD.BA", d(2024, 1, 2), d(2024, 2, 1)),
            CoverageResult::PartiallyCovered {
                cached_start: d(2023, 12, 29),
                cached_end: d(2024, 1, 3),
            }
        );
        assert_eq!(
            cache.covers_range("PAMP.BA", d(2024, 1, 2), d(2024, 1, 3)),
            CoverageResult::NotCached
        );
    }

    #[test]
    fn cached_provider_serves_second_fetch_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CachedProvider::new(
            CountingProvider {
                calls: AtomicUsize::new(0),
            },
            ParquetCache::new(dir.path()),
        );

        let first = provider
            .fetch("GGAL.BA", d(2023, 12, 29), d(2024, 1, 3))
            .unwrap();
        assert_eq!(first.source, DataSource::Synthetic);

        let second = provider
            .fetch("GGAL.BA", d(2024, 1, 2), d(2024, 1, 3))
            .unwrap();
        assert_eq!(second.source, DataSource::Cache);
        assert_eq!(second.quotes.len(), 2);
        assert_eq!(provider.upstream.calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn force_refresh_bypasses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CachedProvider::new(
            CountingProvider {
                calls: AtomicUsize::new(0),
            },
            ParquetCache::new(dir.path()),
        )
        .with_force_refresh(true);

        provider.fetch("GGAL.BA", d(2024, 1, 2), d(2024, 1, 3)).unwrap();
        provider.fetch("GGAL.BA", d(2024, 1, 2), d(2024, 1, 3)).unwrap();
        assert_eq!(provider.upstream.calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn ranges_merge_when_overlapping_or_adjacent() {
        let merged = merge_ranges(vec![
            (d(2024, 3, 1), d(2024, 3, 31)),
            (d(2024, 1, 1), d(2024, 1, 31)),
            (d(2024, 2, 1), d(2024, 2, 10)),
            (d(2024, 3, 15), d(2024, 4, 5)),
        ]);
        assert_eq!(
            merged,
            vec![
                (d(2024, 1, 1), d(2024, 2, 10)),
                (d(2024, 3, 1), d(2024, 4, 5)),
            ]
        );
    }

    #[test]
    fn failed_write_leaves_ticker_uncached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache
            .write("GGAL.BA", &sample_quotes(), DataSource::YahooFinance, &[sample_range()])
            .unwrap();

        // A directory squatting on the temp path makes the 2024 partition fail
        std::fs::create_dir(dir.path().join("ticker=GGAL.BA/2024.parquet.tmp")).unwrap();
        let err = cache.write("GGAL.BA", &sample_quotes(), DataSource::YahooFinance, &[sample_range()]);
        assert!(err.is_err());

        assert!(cache.get_meta("GGAL.BA").is_none());
        assert_eq!(
            cache.covers_range("GGAL.BA", d(2024, 1, 2), d(2024, 1, 3)),
            CoverageResult::NotCached
        );
        assert!(!dir.path().join("ticker=GGAL.BA/2023.parquet.tmp").exists());
    }

    #[test]
    fn narrower_write_removes_stale_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache
            .write("GGAL.BA", &sample_quotes(), DataSource::YahooFinance, &[sample_range()])
            .unwrap();
        cache
            .write(
                "GGAL.BA",
                &sample_quotes()[1..],
                DataSource::YahooFinance,
                &[(d(2024, 1, 2), d(2024, 1, 3))],
            )
            .unwrap();

        assert!(!dir.path().join("ticker=GGAL.BA/2023.parquet").exists());
        assert_eq!(cache.load("GGAL.BA").unwrap().len(), 2);
        assert_eq!(
            cache.get_meta("GGAL.BA").unwrap().covered,
            vec![(d(2024, 1, 2), d(2024, 1, 3))]
        );
    }
}
