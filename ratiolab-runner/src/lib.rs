//! RatioLab Runner: analysis orchestration on top of `ratiolab-core`.
//!
//! - Request configuration (TOML or CLI flags) and validation
//! - Provider selection (Yahoo behind the Parquet cache, CSV, synthetic)
//! - Per-pair pipeline run in parallel, with CCL normalization
//! - Renderer-neutral chart description
//! - CSV / Parquet / JSON export

pub mod chart;
pub mod config;
pub mod export;
pub mod result;
pub mod runner;
pub mod sources;

pub use chart::{build_chart, Axis, ChartSpec, HLine, HistogramPanel, LineStyle, Trace, TraceKind};
pub use config::{AnalysisConfig, ConfigError, DataConfig, DataSourceKind, StatsConfig};
pub use export::{export_json, export_report, import_json, ratio_rows, ExportPaths, RatioRow};
pub use result::{AnalysisReport, PairAnalysis, SCHEMA_VERSION};
pub use runner::{analyze_pair, run_analysis, AnalysisError};
pub use sources::build_provider;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn report_is_send_sync() {
        assert_send::<AnalysisReport>();
        assert_sync::<AnalysisReport>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<AnalysisConfig>();
        assert_sync::<AnalysisConfig>();
        assert_send::<AnalysisError>();
        assert_sync::<AnalysisError>();
    }
}
