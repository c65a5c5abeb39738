//! Build the data provider named by a request.

use crate::config::{DataConfig, DataSourceKind};
use ratiolab_core::data::{
    CachedProvider, CsvProvider, DataError, DataProvider, ParquetCache, SyntheticProvider,
    YahooProvider,
};

/// The provider for `config`.
///
/// Yahoo sits behind the Parquet cache unless caching is disabled. CSV and
/// synthetic data are local and never cached.
pub fn build_provider(config: &DataConfig) -> Result<Box<dyn DataProvider>, DataError> {
    let provider: Box<dyn DataProvider> = match config.source {
        DataSourceKind::Yahoo if config.use_cache => Box::new(
            CachedProvider::new(YahooProvider::new()?, ParquetCache::new(&config.cache_dir))
                .with_force_refresh(config.force_refresh),
        ),
        DataSourceKind::Yahoo => Box::new(YahooProvider::new()?),
        DataSourceKind::Csv => Box::new(CsvProvider::new(&config.csv_dir)),
        DataSourceKind::Synthetic => Box::new(SyntheticProvider::new(config.seed)),
    };
    tracing::debug!(source = %config.source, provider = provider.name(), "data provider ready");
    Ok(provider)
}
