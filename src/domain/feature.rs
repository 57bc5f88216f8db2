//! Ranking feature registry.
//!
//! Each [`Feature`] is a pure function from a window of daily bars to one raw
//! score. The set is closed; metric names from configuration are resolved
//! through [`Feature::from_str`] and anything unrecognised is rejected with
//! [`RankfolioError::UnknownFeature`].
//!
//! All features follow "higher is better" so they can share one
//! normalization and ranking direction:
//! - `momentum`: `last_close / first_close - 1`, 0 with fewer than 2 bars
//! - `volatility`: `1 / (1 + stdev(daily returns))`, 0 with fewer than 2 returns
//! - `average_volume`: mean volume of bars that carry one, 0 if none do

use crate::domain::error::RankfolioError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::price_series::PriceTable;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    Momentum,
    Volatility,
    AverageVolume,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::Momentum, Feature::Volatility, Feature::AverageVolume];

    pub fn name(self) -> &'static str {
        match self {
            Feature::Momentum => "momentum",
            Feature::Volatility => "volatility",
            Feature::AverageVolume => "average_volume",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Feature::Momentum => "price change from first to last close in the window",
            Feature::Volatility => "inverse of daily return standard deviation (calmer is higher)",
            Feature::AverageVolume => "mean traded volume in the window",
        }
    }

    /// Raw score for one instrument over an already-windowed slice of bars.
    pub fn compute(self, window: &[OhlcvBar]) -> f64 {
        match self {
            Feature::Momentum => momentum(window),
            Feature::Volatility => inverse_volatility(window),
            Feature::AverageVolume => average_volume(window),
        }
    }

    /// Raw scores for every instrument that has at least one bar on or
    /// before `as_of`. Instruments without history are absent from the map.
    pub fn compute_table(
        self,
        table: &PriceTable,
        as_of: NaiveDate,
        lookback_days: u32,
    ) -> BTreeMap<String, f64> {
        table
            .iter()
            .filter(|series| !series.until(as_of).is_empty())
            .map(|series| {
                let window = series.window(as_of, lookback_days);
                (series.symbol.clone(), self.compute(window))
            })
            .collect()
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = RankfolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Feature::ALL
            .into_iter()
            .find(|feature| feature.name() == wanted)
            .ok_or_else(|| RankfolioError::UnknownFeature {
                name: s.trim().to_string(),
            })
    }
}

pub fn momentum(window: &[OhlcvBar]) -> f64 {
    match (window.first(), window.last()) {
        (Some(first), Some(last)) if window.len() >= 2 => last.close / first.close - 1.0,
        _ => 0.0,
    }
}

pub fn inverse_volatility(window: &[OhlcvBar]) -> f64 {
    let returns: Vec<f64> = window
        .windows(2)
        .map(|w| w[1].close / w[0].close - 1.0)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    1.0 / (1.0 + sample_stddev(&returns))
}

pub fn average_volume(window: &[OhlcvBar]) -> f64 {
    let volumes: Vec<f64> = window.iter().filter_map(|b| b.volume).collect();
    if volumes.is_empty() {
        return 0.0;
    }
    volumes.iter().sum::<f64>() / volumes.len() as f64
}

/// Sample (n - 1) standard deviation; 0 for fewer than two values.
pub(crate) fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}
