//! The ratio pipeline: align → ratio → rebase → rolling statistics.
//!
//! Every stage is a pure function of its inputs. Recoverable conditions are
//! recorded in a [`WarningLog`]; only [`RebaseError`] is surfaced as an error.

pub mod align;
pub mod ccl;
pub mod dispersion;
pub mod ratio;
pub mod rebase;
pub mod rolling;
pub mod warning;

pub use align::{align_pair, AlignedPair, FillPolicy, Pair, PairIssue, ValidMask};
pub use ccl::{implied_ccl, normalize_by_ccl, CclSource};
pub use dispersion::{
    dispersion, dispersion_histogram, histogram_bins, percentile, DispersionHistogram,
    HistogramBin, PercentileMarker, PercentileSet,
};
pub use ratio::{ratio, RatioMode, RatioOutput};
pub use rebase::{rebase, rebase_with, resolve_reference, RebaseError, Rebased, ResolvedReference};
pub use rolling::{
    bands, global_bands, longest_run, rolling_stats, rolling_std, sma, window_fits, Bands,
    GlobalBands, RollingStats,
};
pub use warning::{Warning, WarningLog};
