//! CSV directory provider.
//!
//! Reads `{dir}/{TICKER}.csv` with a `date,adj_close[,volume]` header. The
//! Yahoo export spelling (`Date`, `Adj Close`, `Volume`) is accepted too,
//! so files saved from the web download work unchanged.

use super::provider::{DataError, DataProvider, DataSource, FetchResult, Quote};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Date")]
    date: NaiveDate,
    #[serde(alias = "Adj Close", alias = "adjclose", default, deserialize_with = "lenient_f64")]
    adj_close: Option<f64>,
    #[serde(alias = "Volume", default, deserialize_with = "lenient_f64")]
    volume: Option<f64>,
}

/// Empty cells and `null`/`NaN` placeholders read as absent.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite()))
}

pub struct CsvProvider {
    dir: PathBuf,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{ticker}.csv"))
    }

    /// Parse every row of one file.
    pub fn read_file(path: &Path) -> Result<Vec<Quote>, DataError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| DataError::Csv(format!("{}: {e}", path.display())))?;

        reader
            .deserialize::<CsvRow>()
            .enumerate()
            .map(|(i, row)| {
                let row =
                    row.map_err(|e| DataError::Csv(format!("{} row {}: {e}", path.display(), i + 1)))?;
                Ok(Quote {
                    date: row.date,
                    adj_close: row.adj_close,
                    volume: row.volume,
                })
            })
            .collect()
    }
}

impl DataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let path = self.path_for(ticker);
        if !path.exists() {
            return Err(DataError::TickerNotFound {
                ticker: ticker.to_string(),
            });
        }

        let quotes: Vec<Quote> = Self::read_file(&path)?
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

        tracing::debug!(ticker, rows = quotes.len(), path = %path.display(), "csv loaded");
        Ok(FetchResult {
            ticker: ticker.to_string(),
            quotes,
            source: DataSource::CsvImport,
        })
    }
}
