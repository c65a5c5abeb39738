//! Deterministic synthetic prices for offline runs and demos.
//!
//! Each ticker gets its own random walk. The walk's seed is derived from the
//! master seed and the ticker via BLAKE3, so a ticker's series does not depend
//! on which other tickers are requested or in what order. Walks are anchored
//! at a fixed epoch so any date range of the same ticker sees the same prices.

use super::provider::{DataError, DataProvider, DataSource, FetchResult, Quote};
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ANCHOR: NaiveDate = match NaiveDate::from_ymd_opt(2000, 1, 3) {
    Some(d) => d,
    None => panic!("anchor is a valid date"),
};

/// Largest daily move as a fraction of price.
const DAILY_VOL: f64 = 0.02;

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    master_seed: u64,
}

impl SyntheticProvider {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    fn ticker_seed(&self, ticker: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(ticker.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Business-day walk from the anchor up to `end`.
    fn walk(&self, ticker: &str, end: NaiveDate) -> Vec<Quote> {
        let mut rng = StdRng::seed_from_u64(self.ticker_seed(ticker));
        let mut price: f64 = rng.gen_range(50.0..5_000.0);
        let base_volume: f64 = rng.gen_range(10_000.0..1_000_000.0);

        let mut quotes = Vec::new();
        let mut date = ANCHOR;
        while date <= end {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                let shock: f64 = rng.gen_range(-1.0..1.0) * DAILY_VOL;
                price *= 1.0 + shock;
                let volume = (base_volume * rng.gen_range(0.5..1.5)).round();
                quotes.push(Quote {
                    date,
                    adj_close: Some(price),
                    volume: Some(volume),
                });
            }
            date += chrono::Duration::days(1);
        }
        quotes
    }
}

impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let quotes: Vec<Quote> = self
            .walk(ticker, end)
            .into_iter()
            .filter(|q| q.date >= start)
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
            source: DataSource::Synthetic,
        })
    }
}
