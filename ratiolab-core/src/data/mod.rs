//! Data sources, the Parquet cache and multi-ticker fetching.

pub mod cache;
pub mod csv_import;
pub mod fetch;
pub mod provider;
pub mod synthetic;
pub mod universe;
pub mod yahoo;

pub use cache::{CacheMeta, CacheStatus, CachedProvider, CoverageResult, ParquetCache};
pub use csv_import::CsvProvider;
pub use fetch::{fetch_frame, FetchedFrame};
pub use provider::{
    history_from_quotes, DataError, DataProvider, DataSource, FetchProgress, FetchResult,
    NoProgress, Quote, StdoutProgress,
};
pub use synthetic::SyntheticProvider;
pub use universe::{Universe, UniverseError};
pub use yahoo::YahooProvider;
