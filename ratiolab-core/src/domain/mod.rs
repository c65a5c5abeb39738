//! Domain types for RatioLab

pub mod frame;
pub mod series;
pub mod ticker;

pub use frame::{TickerFrame, TickerHistory};
pub use series::TimeSeries;
pub use ticker::{is_merval_ticker, normalize_ticker, TickerError, MAX_COMPARISONS, MERVAL_SUFFIX};
