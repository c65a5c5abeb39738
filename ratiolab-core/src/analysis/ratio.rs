//! Ratio of main to comparison, optionally weighted by traded volume.
//!
//! The output lives on the aligned union index. It is absent wherever the
//! mask is false and wherever the denominator is zero.

use super::align::AlignedPair;
use super::warning::{Warning, WarningLog};
use crate::domain::TimeSeries;
use serde::{Deserialize, Serialize};

/// What is divided by what.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioMode {
    /// `price_main / price_other`
    #[default]
    PriceRatio,
    /// `(price_main * volume_main) / (price_other * volume_other)`
    PriceVolumeRatio,
}

impl RatioMode {
    pub fn label(&self) -> &'static str {
        match self {
            RatioMode::PriceRatio => "price",
            RatioMode::PriceVolumeRatio => "price x volume",
        }
    }
}

/// Ratio series plus the number of points dropped for a zero denominator.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioOutput {
    pub series: TimeSeries,
    pub excluded: usize,
}

/// Compute the ratio series for an aligned pair.
///
/// A zero denominator yields an absent point, never infinity. Excluded
/// points are counted and reported once per pair.
pub fn ratio(aligned: &AlignedPair, warnings: &mut WarningLog) -> RatioOutput {
    let dates = aligned.mask.dates().to_vec();
    let mut excluded = 0;

    let values = (0..dates.len())
        .map(|i| {
            if !aligned.mask.is_valid(i) {
                return None;
            }
            let (num, den) = match aligned.mode {
                RatioMode::PriceRatio => (aligned.main_price[i]?, aligned.other_price[i]?),
                RatioMode::PriceVolumeRatio => {
                    let mv = aligned.main_volume.as_ref()?[i]?;
                    let ov = aligned.other_volume.as_ref()?[i]?;
                    (aligned.main_price[i]? * mv, aligned.other_price[i]? * ov)
                }
            };
            let value = num / den;
            if den == 0.0 || !value.is_finite() {
                excluded += 1;
                return None;
            }
            Some(value)
        })
        .collect();

    if excluded > 0 {
        warnings.push(Warning::DivisionByZeroExcluded {
            pair: aligned.pair.label(),
            count: excluded,
        });
    }

    RatioOutput {
        series: TimeSeries::from_index(dates, values),
        excluded,
    }
}
