//! Price history port trait.

use crate::domain::error::RankfolioError;
use crate::domain::price_series::PriceTable;
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Source of daily bars for the ranking and backtest engine.
///
/// Implementations return one series per requested symbol, sorted by date
/// with no repeated dates. An unknown symbol yields an empty series rather
/// than an error.
pub trait PriceHistoryPort {
    /// Bars dated on or after `start` for every symbol in `symbols`.
    fn get_price_history(
        &self,
        symbols: &BTreeSet<String>,
        start: NaiveDate,
    ) -> Result<PriceTable, RankfolioError>;

    /// Every symbol the source can serve; used when no include list is set.
    fn list_known_universe(&self) -> Result<BTreeSet<String>, RankfolioError>;
}
