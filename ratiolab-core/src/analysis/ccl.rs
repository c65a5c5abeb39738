//! CCL normalization: express peso prices in implied dollars.
//!
//! The implied rate is the price of a locally listed security divided by
//! the dollar price of its foreign listing, scaled by the conversion factor
//! (local shares per foreign share).

use crate::domain::{TickerHistory, TimeSeries};
use serde::{Deserialize, Serialize};

/// Which pair of listings defines the implied rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CclSource {
    /// Peso listing, e.g. `YPFD.BA`.
    pub local: String,
    /// Dollar listing, e.g. `YPF`.
    pub foreign: String,
    /// Local shares represented by one foreign share.
    #[serde(default = "default_factor")]
    pub factor: f64,
}

fn default_factor() -> f64 {
    1.0
}

impl Default for CclSource {
    fn default() -> Self {
        Self {
            local: "YPFD.BA".into(),
            foreign: "YPF".into(),
            factor: 1.0,
        }
    }
}

/// `ccl[t] = local[t] * factor / foreign[t]` on dates where both prices exist.
pub fn implied_ccl(local: &TimeSeries, foreign: &TimeSeries, factor: f64) -> TimeSeries {
    TimeSeries::from_points(local.defined().filter_map(|(date, l)| {
        let f = foreign.get(date)?;
        (f > 0.0).then(|| (date, Some(l * factor / f)))
    }))
}

/// Divide prices by the rate of the same date. Dates without a rate become
/// absent; volume is left untouched.
pub fn normalize_by_ccl(history: &TickerHistory, ccl: &TimeSeries) -> TickerHistory {
    let adj_close = history
        .adj_close
        .map_defined(|date, price| ccl.get(date).filter(|r| *r > 0.0).map(|r| price / r));
    TickerHistory::new(adj_close, history.volume.clone())
}
