//! Backtest orchestration: selection, scheduling, trades and simulation.
//!
//! Auto selection re-ranks the candidate universe on every scheduled date
//! using only bars up to that date. Its calendar is the union of the
//! candidates' trading dates, and only candidates with a bar on the
//! rebalance date are ranked, so a late listing or a sparse history never
//! narrows the run. Manual selection reuses its fixed weights over the dates
//! all of its instruments share. Both go through the same trade generator and
//! daily walk.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::error::RankfolioError;
use super::metrics::Stats;
use super::portfolio::EquityPoint;
use super::price_series::PriceTable;
use super::schedule::{RebalanceFrequency, schedule};
use super::scoring::compute_ranking_as_of;
use super::selection::{Selection, UniverseFilters, select};
use super::simulation::{PriceMatrix, walk};
use super::trade::{RebalanceEvent, generate_trades};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub frequency: RebalanceFrequency,
    pub selection: Selection,
    /// Only consulted by auto selection.
    pub filters: UniverseFilters,
    pub initial_value: f64,
}

impl BacktestConfig {
    /// Buy-and-hold from `start_date` with a unit initial value and no filters.
    pub fn new(start_date: NaiveDate, selection: Selection) -> Self {
        BacktestConfig {
            start_date,
            frequency: RebalanceFrequency::default(),
            selection,
            filters: UniverseFilters::default(),
            initial_value: 1.0,
        }
    }

    pub fn validate(&self) -> Result<(), RankfolioError> {
        if !(self.initial_value > 0.0 && self.initial_value.is_finite()) {
            return Err(RankfolioError::InvalidInitialValue(self.initial_value));
        }
        self.selection.validate()
    }

    /// Earliest date whose bars can influence the first ranking.
    pub fn history_start(&self) -> NaiveDate {
        let lookback = i64::from(self.selection.max_lookback_days());
        self.start_date
            .checked_sub_signed(chrono::Duration::days(lookback))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Manual buy-and-hold runs report no rebalance list.
    pub fn reports_rebalances(&self) -> bool {
        !matches!(
            (&self.selection, self.frequency),
            (Selection::Manual(_), RebalanceFrequency::Never)
        )
    }
}

/// Raw simulation output: every event, including the initial allocation.
#[derive(Debug, Clone)]
pub struct SimulationRun {
    pub equity: Vec<EquityPoint>,
    pub events: Vec<RebalanceEvent>,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub equity: Vec<EquityPoint>,
    pub rebalances: Option<Vec<RebalanceEvent>>,
    pub stats: Stats,
}

/// Runs the day-by-day simulation over `table`.
///
/// `universe` is the known universe for auto selection; manual selection
/// trades exactly its own symbols and ignores it.
pub fn run_simulation(
    table: &PriceTable,
    universe: &[String],
    config: &BacktestConfig,
) -> Result<SimulationRun, RankfolioError> {
    config.validate()?;

    match &config.selection {
        Selection::Manual(manual) => {
            let matrix = PriceMatrix::build(table, manual.symbols(), config.start_date)?;
            let targets = manual.target_weights();
            let dates: BTreeSet<NaiveDate> =
                schedule(matrix.dates(), config.frequency).into_iter().collect();
            info!(
                symbols = matrix.symbols().len(),
                trading_days = matrix.len(),
                rebalances = dates.len(),
                "running manual allocation"
            );

            let mut events = Vec::with_capacity(dates.len());
            let equity = walk(&matrix, config.initial_value, |date, holdings| {
                if !dates.contains(&date) {
                    return Ok(None);
                }
                let event = generate_trades(date, holdings, &targets);
                let target = event.target_allocation();
                events.push(event);
                Ok(Some(target))
            })?;
            Ok(SimulationRun { equity, events })
        }
        Selection::Auto(auto) => {
            let candidates =
                tradable_candidates(table, universe, &config.filters, config.start_date);
            let matrix = PriceMatrix::build_union(table, &candidates, config.start_date)?;
            let dates: BTreeSet<NaiveDate> =
                schedule(matrix.dates(), config.frequency).into_iter().collect();
            info!(
                candidates = candidates.len(),
                trading_days = matrix.len(),
                rebalances = dates.len(),
                top_n = auto.top_n,
                "running auto selection"
            );

            let mut events = Vec::with_capacity(dates.len());
            let equity = walk(&matrix, config.initial_value, |date, holdings| {
                if !dates.contains(&date) {
                    return Ok(None);
                }
                let listed: PriceTable = candidates
                    .iter()
                    .filter(|s| matrix.trades_on(s, date))
                    .filter_map(|s| table.get(s).cloned())
                    .collect();
                let ranked = if listed.is_empty() {
                    Vec::new()
                } else {
                    compute_ranking_as_of(&listed, &auto.components, date)?
                };
                let picked = select(&candidates, &config.filters, &ranked, auto);
                debug!(
                    %date,
                    tradable = listed.len(),
                    selected = picked.len(),
                    "rebalance selection"
                );
                let event = generate_trades(date, holdings, &auto.target_weights(&picked));
                let target = event.target_allocation();
                events.push(event);
                Ok(Some(target))
            })?;
            Ok(SimulationRun { equity, events })
        }
    }
}

/// Full backtest: simulation plus summary statistics.
pub fn run_backtest(
    table: &PriceTable,
    universe: &[String],
    config: &BacktestConfig,
) -> Result<BacktestResult, RankfolioError> {
    let run = run_simulation(table, universe, config)?;
    let stats = Stats::compute(&run.equity);
    info!(
        points = run.equity.len(),
        events = run.events.len(),
        cagr = stats.cagr,
        max_drawdown = stats.max_drawdown,
        "backtest complete"
    );

    let rebalances = config.reports_rebalances().then_some(run.events);
    Ok(BacktestResult {
        equity: run.equity,
        rebalances,
        stats,
    })
}

/// Filtered universe members with at least one bar on or after `start`.
fn tradable_candidates(
    table: &PriceTable,
    universe: &[String],
    filters: &UniverseFilters,
    start: NaiveDate,
) -> Vec<String> {
    filters
        .apply(universe)
        .into_iter()
        .filter(|symbol| {
            let has_rows = table.get(symbol).is_some_and(|s| !s.since(start).is_empty());
            if !has_rows {
                warn!(%symbol, %start, "no price history from start date, dropping candidate");
            }
            has_rows
        })
        .collect()
}
