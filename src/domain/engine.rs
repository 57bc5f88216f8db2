//! Entry points that pull price history through a [`PriceHistoryPort`] and
//! run the ranking or backtest logic over it.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::info;

use super::backtest::{BacktestConfig, BacktestResult, run_backtest};
use super::error::RankfolioError;
use super::scoring::{
    RankedScore, ScoreComponent, compute_ranking, compute_ranking_as_of, validate_components,
};
use super::selection::{Selection, UniverseFilters};
use crate::ports::price_port::PriceHistoryPort;

/// Filtered universe: the include list when given, otherwise everything the
/// port knows about.
pub fn resolve_universe(
    port: &dyn PriceHistoryPort,
    filters: &UniverseFilters,
) -> Result<Vec<String>, RankfolioError> {
    let known = if filters.needs_known_universe() {
        port.list_known_universe()?
    } else {
        BTreeSet::new()
    };
    Ok(filters.apply(&known))
}

/// Score preview for the filtered universe.
///
/// With `as_of` set, only bars up to that date are used; otherwise the full
/// history is ranked as of its latest date.
pub fn rank(
    port: &dyn PriceHistoryPort,
    components: &[ScoreComponent],
    filters: &UniverseFilters,
    as_of: Option<NaiveDate>,
) -> Result<Vec<RankedScore>, RankfolioError> {
    validate_components(components)?;
    let universe = resolve_universe(port, filters)?;
    if universe.is_empty() {
        return Err(RankfolioError::EmptyUniverse);
    }

    let start = match as_of {
        Some(date) => {
            let lookback = components.iter().map(|c| c.lookback_days).max().unwrap_or(0);
            date.checked_sub_signed(chrono::Duration::days(i64::from(lookback)))
                .unwrap_or(NaiveDate::MIN)
        }
        None => NaiveDate::MIN,
    };
    let symbols: BTreeSet<String> = universe.into_iter().collect();
    let table = port.get_price_history(&symbols, start)?;
    info!(instruments = symbols.len(), %start, "ranking universe");

    match as_of {
        Some(date) => compute_ranking_as_of(&table, components, date),
        None => compute_ranking(&table, components),
    }
}

/// Runs a full backtest, fetching enough history before the start date for
/// the longest lookback.
pub fn backtest(
    port: &dyn PriceHistoryPort,
    config: &BacktestConfig,
) -> Result<BacktestResult, RankfolioError> {
    config.validate()?;

    let universe: Vec<String> = match &config.selection {
        Selection::Manual(manual) => manual.symbols().to_vec(),
        Selection::Auto(_) => resolve_universe(port, &config.filters)?,
    };
    let symbols: BTreeSet<String> = universe.iter().cloned().collect();
    let history_start = config.history_start();
    info!(
        instruments = symbols.len(),
        start = %config.start_date,
        %history_start,
        rebalance = %config.frequency,
        "fetching price history"
    );

    let table = port.get_price_history(&symbols, history_start)?;
    run_backtest(&table, &universe, config)
}
