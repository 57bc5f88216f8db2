//! Rebalance calendar.
//!
//! A scheduled rebalance falls on the last trading date of each calendar
//! month, quarter or year present in the calendar, including a final partial
//! period. The first calendar date always carries the initial allocation.

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RebalanceFrequency {
    /// Buy and hold after the initial allocation.
    #[default]
    Never,
    Monthly,
    Quarterly,
    Yearly,
}

impl FromStr for RebalanceFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(RebalanceFrequency::Never),
            "monthly" => Ok(RebalanceFrequency::Monthly),
            "quarterly" => Ok(RebalanceFrequency::Quarterly),
            "yearly" => Ok(RebalanceFrequency::Yearly),
            other => Err(format!(
                "expected none, monthly, quarterly or yearly, got {other:?}"
            )),
        }
    }
}

impl fmt::Display for RebalanceFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RebalanceFrequency::Never => "none",
            RebalanceFrequency::Monthly => "monthly",
            RebalanceFrequency::Quarterly => "quarterly",
            RebalanceFrequency::Yearly => "yearly",
        })
    }
}

/// Last trading date of every period touched by `calendar`.
pub fn rebalance_dates(calendar: &[NaiveDate], freq: RebalanceFrequency) -> Vec<NaiveDate> {
    let indices = match freq {
        RebalanceFrequency::Never => return Vec::new(),
        RebalanceFrequency::Monthly => find_period_end_indices(calendar, |d| (d.year(), d.month())),
        RebalanceFrequency::Quarterly => {
            find_period_end_indices(calendar, |d| (d.year(), (d.month() - 1) / 3))
        }
        RebalanceFrequency::Yearly => find_period_end_indices(calendar, |d| (d.year(), 0)),
    };
    indices.into_iter().map(|i| calendar[i]).collect()
}

/// The initial allocation date followed by every scheduled rebalance after
/// it. Strictly increasing.
pub fn schedule(calendar: &[NaiveDate], freq: RebalanceFrequency) -> Vec<NaiveDate> {
    let Some(&first) = calendar.first() else {
        return Vec::new();
    };
    let mut dates = vec![first];
    dates.extend(
        rebalance_dates(calendar, freq)
            .into_iter()
            .filter(|&d| d > first),
    );
    dates
}

fn find_period_end_indices<T: PartialEq>(
    dates: &[NaiveDate],
    period_fn: impl Fn(&NaiveDate) -> T,
) -> Vec<usize> {
    let mut indices = Vec::new();
    for (i, date) in dates.iter().enumerate() {
        let is_last_of_period = match dates.get(i + 1) {
            Some(next) => period_fn(next) != period_fn(date),
            None => true,
        };
        if is_last_of_period {
            indices.push(i);
        }
    }
    indices
}
