//! RatioLab Core: time series, data providers and the ratio pipeline.
//!
//! - Domain types (`TimeSeries`, `TickerHistory`, `TickerFrame`)
//! - Data providers (Yahoo Finance, CSV, synthetic) and the Parquet cache
//! - Alignment, ratio, rebasing, rolling statistics and dispersion
//!
//! Everything here is synchronous and free of global state; the runner crate
//! decides how invocations are scheduled.

pub mod analysis;
pub mod data;
pub mod domain;
