//! Daily equity simulation over an aligned price matrix.
//!
//! A matrix is either the inner join of every involved instrument's history
//! from the start date onward (fixed portfolios), or the union of their
//! trading dates (dynamic selection, where instruments list and delist over
//! the run). On a date an instrument does not trade its price carries
//! forward, so its return that day is 0.
//!
//! Each day the portfolio earns the weighted return of its current holdings,
//! `V(t) = V(t-1) * (1 + Σ w_i(t-1) * r_i(t))`, then weights drift with
//! relative performance. On a rebalance date the drifted weights are replaced
//! by the event's targets after that day's value is recorded, so new targets
//! apply from the following day's returns.

use crate::domain::error::RankfolioError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::portfolio::{Allocation, EquityPoint};
use crate::domain::price_series::PriceTable;
use crate::domain::trade::RebalanceEvent;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Bars for a fixed set of symbols aligned on a shared calendar.
#[derive(Debug, Clone)]
pub struct PriceMatrix {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    /// `rows[s][t]` is the bar for `symbols[s]` on `dates[t]`, if it traded.
    rows: Vec<Vec<Option<OhlcvBar>>>,
    /// `returns[s][t]`: close against the last close seen before `t`.
    returns: Vec<Vec<f64>>,
}

impl PriceMatrix {
    /// Aligns `symbols` on the dates every one of them traded, from `start`.
    ///
    /// Fails with [`RankfolioError::MissingPriceHistory`] for the first
    /// symbol that has no bar on or after `start`, and with
    /// [`RankfolioError::NoCommonHistory`] when there are no symbols or no
    /// shared dates.
    pub fn build(
        table: &PriceTable,
        symbols: &[String],
        start: NaiveDate,
    ) -> Result<Self, RankfolioError> {
        if symbols.is_empty() {
            return Err(RankfolioError::NoCommonHistory {
                symbols: Vec::new(),
            });
        }

        let mut histories = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let bars = table.get(symbol).map(|s| s.since(start)).unwrap_or(&[]);
            if bars.is_empty() {
                return Err(RankfolioError::MissingPriceHistory {
                    symbol: symbol.clone(),
                });
            }
            histories.push(bars);
        }

        let mut common: BTreeSet<NaiveDate> = histories[0].iter().map(|b| b.date).collect();
        for bars in &histories[1..] {
            let dates: BTreeSet<NaiveDate> = bars.iter().map(|b| b.date).collect();
            common.retain(|d| dates.contains(d));
        }
        if common.is_empty() {
            return Err(RankfolioError::NoCommonHistory {
                symbols: symbols.to_vec(),
            });
        }

        Ok(Self::aligned(common, symbols.to_vec(), &histories))
    }

    /// Aligns `symbols` on every date at least one of them traded, from
    /// `start`. Symbols without a bar on or after `start` are left out.
    ///
    /// Fails with [`RankfolioError::NoCommonHistory`] only when no symbol
    /// has any bar in range.
    pub fn build_union(
        table: &PriceTable,
        symbols: &[String],
        start: NaiveDate,
    ) -> Result<Self, RankfolioError> {
        let (kept, histories): (Vec<String>, Vec<&[OhlcvBar]>) = symbols
            .iter()
            .filter_map(|symbol| {
                let bars = table.get(symbol).map(|s| s.since(start))?;
                (!bars.is_empty()).then(|| (symbol.clone(), bars))
            })
            .unzip();

        let calendar: BTreeSet<NaiveDate> = histories
            .iter()
            .flat_map(|bars| bars.iter().map(|b| b.date))
            .collect();
        if calendar.is_empty() {
            return Err(RankfolioError::NoCommonHistory {
                symbols: symbols.to_vec(),
            });
        }

        Ok(Self::aligned(calendar, kept, &histories))
    }

    fn aligned(
        calendar: BTreeSet<NaiveDate>,
        symbols: Vec<String>,
        histories: &[&[OhlcvBar]],
    ) -> Self {
        let dates: Vec<NaiveDate> = calendar.into_iter().collect();

        let rows: Vec<Vec<Option<OhlcvBar>>> = histories
            .iter()
            .map(|bars| {
                let mut bars = bars.iter().peekable();
                dates
                    .iter()
                    .map(|date| {
                        while bars.next_if(|b| b.date < *date).is_some() {}
                        bars.next_if(|b| b.date == *date).cloned()
                    })
                    .collect()
            })
            .collect();

        let returns = rows
            .iter()
            .map(|row| {
                let mut last_close: Option<f64> = None;
                row.iter()
                    .map(|bar| match bar {
                        Some(bar) => {
                            let r = last_close.map_or(0.0, |prev| bar.return_since(prev));
                            last_close = Some(bar.close);
                            r
                        }
                        None => 0.0,
                    })
                    .collect()
            })
            .collect();

        PriceMatrix {
            dates,
            symbols,
            rows,
            returns,
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    /// Close on day `t`; `None` when the symbol did not trade that day.
    pub fn close(&self, symbol: &str, t: usize) -> Option<f64> {
        let s = self.symbols.iter().position(|x| x == symbol)?;
        self.rows[s].get(t)?.as_ref().map(|b| b.close)
    }

    /// True when `symbol` has a bar on `date`.
    pub fn trades_on(&self, symbol: &str, date: NaiveDate) -> bool {
        self.dates
            .binary_search(&date)
            .is_ok_and(|t| self.close(symbol, t).is_some())
    }

    /// Simple return of every symbol on day `t`. Zero on a symbol's first
    /// bar and on days it did not trade.
    pub fn returns_on(&self, t: usize) -> BTreeMap<String, f64> {
        self.symbols
            .iter()
            .zip(&self.returns)
            .map(|(symbol, returns)| (symbol.clone(), returns.get(t).copied().unwrap_or(0.0)))
            .collect()
    }
}

/// Running portfolio state: value, drifted holdings and the last target.
#[derive(Debug, Clone)]
pub struct EquitySimulator {
    value: f64,
    holdings: Allocation,
    target: Allocation,
    curve: Vec<EquityPoint>,
}

impl EquitySimulator {
    pub fn new(initial_value: f64) -> Self {
        EquitySimulator {
            value: initial_value,
            holdings: Allocation::all_cash(),
            target: Allocation::all_cash(),
            curve: Vec::new(),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Weights as they stand after the most recent day's drift.
    pub fn holdings(&self) -> &Allocation {
        &self.holdings
    }

    /// Applies one day of returns and records the resulting value.
    pub fn advance(&mut self, date: NaiveDate, returns: &BTreeMap<String, f64>) {
        self.value *= 1.0 + self.holdings.portfolio_return(returns);
        self.holdings = self.holdings.drift(returns, &self.target);
        self.curve.push(EquityPoint {
            date,
            value: self.value,
        });
    }

    /// Snaps holdings to `target`.
    pub fn rebalance(&mut self, target: Allocation) {
        self.holdings = target.clone();
        self.target = target;
    }

    pub fn into_curve(self) -> Vec<EquityPoint> {
        self.curve
    }
}

/// Walks every matrix date in order. `on_date` sees the drifted holdings
/// after the day's value is recorded and may return a new target allocation.
pub fn walk<F>(
    matrix: &PriceMatrix,
    initial_value: f64,
    mut on_date: F,
) -> Result<Vec<EquityPoint>, RankfolioError>
where
    F: FnMut(NaiveDate, &Allocation) -> Result<Option<Allocation>, RankfolioError>,
{
    validate_initial_value(initial_value)?;
    let mut simulator = EquitySimulator::new(initial_value);

    for (t, &date) in matrix.dates().iter().enumerate() {
        simulator.advance(date, &matrix.returns_on(t));
        if let Some(target) = on_date(date, simulator.holdings())? {
            simulator.rebalance(target);
        }
    }

    Ok(simulator.into_curve())
}

/// Replays precomputed rebalance events over the matrix.
///
/// Event dates must be strictly increasing trading dates of the matrix, and
/// every instrument an event allocates to must be part of it.
pub fn simulate(
    matrix: &PriceMatrix,
    initial_value: f64,
    events: &[RebalanceEvent],
) -> Result<Vec<EquityPoint>, RankfolioError> {
    let calendar: BTreeSet<NaiveDate> = matrix.dates().iter().copied().collect();
    let mut by_date: HashMap<NaiveDate, Allocation> = HashMap::with_capacity(events.len());
    let mut previous: Option<NaiveDate> = None;

    for event in events {
        if !calendar.contains(&event.date) {
            return Err(RankfolioError::Data {
                reason: format!("rebalance date {} is not a trading day", event.date),
            });
        }
        if previous.is_some_and(|p| event.date <= p) {
            return Err(RankfolioError::Data {
                reason: format!("rebalance date {} is out of order", event.date),
            });
        }
        previous = Some(event.date);

        if let Some(trade) = event
            .trades
            .iter()
            .find(|t| !t.is_cash() && t.target_weight > 0.0 && !matrix.contains_symbol(&t.symbol))
        {
            return Err(RankfolioError::MissingPriceHistory {
                symbol: trade.symbol.clone(),
            });
        }
        by_date.insert(event.date, event.target_allocation());
    }

    walk(matrix, initial_value, |date, _| Ok(by_date.remove(&date)))
}

fn validate_initial_value(initial_value: f64) -> Result<(), RankfolioError> {
    if initial_value > 0.0 && initial_value.is_finite() {
        Ok(())
    } else {
        Err(RankfolioError::InvalidInitialValue(initial_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price_series::PriceSeries;
    use crate::domain::trade::generate_trades;
    use approx::assert_abs_diff_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn series(symbol: &str, points: &[(u32, f64)]) -> PriceSeries {
        PriceSeries::new(
            symbol,
            points
                .iter()
                .map(|&(d, close)| OhlcvBar::from_close(day(d), close))
                .collect(),
        )
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn targets(list: &[(&str, f64)]) -> Vec<(String, f64)> {
        list.iter().map(|&(s, w)| (s.to_string(), w)).collect()
    }

    fn two_symbol_table() -> PriceTable {
        vec![
            series("AAA", &[(1, 100.0), (2, 110.0), (3, 121.0), (4, 121.0)]),
            series("BBB", &[(1, 50.0), (2, 50.0), (3, 45.0), (4, 54.0)]),
        ]
        .into_iter()
        .collect()
    }

    mod price_matrix {
        use super::*;

        #[test]
        fn inner_join_on_dates() {
            let table: PriceTable = vec![
                series("AAA", &[(1, 1.0), (2, 1.0), (3, 1.0), (5, 1.0)]),
                series("BBB", &[(2, 2.0), (3, 2.0), (4, 2.0), (5, 2.0)]),
            ]
            .into_iter()
            .collect();

            let matrix = PriceMatrix::build(&table, &symbols(&["AAA", "BBB"]), day(1)).unwrap();
            assert_eq!(matrix.dates(), &[day(2), day(3), day(5)]);
            assert_eq!(matrix.close("BBB", 2), Some(2.0));
        }

        #[test]
        fn start_date_trims_history() {
            let matrix =
                PriceMatrix::build(&two_symbol_table(), &symbols(&["AAA"]), day(3)).unwrap();
            assert_eq!(matrix.dates(), &[day(3), day(4)]);
        }

        #[test]
        fn first_day_return_is_zero() {
            let matrix =
                PriceMatrix::build(&two_symbol_table(), &symbols(&["AAA", "BBB"]), day(1))
                    .unwrap();
            assert!(matrix.returns_on(0).values().all(|&r| r == 0.0));
            let r = matrix.returns_on(1);
            assert_abs_diff_eq!(r["AAA"], 0.10, epsilon = 1e-12);
            assert_abs_diff_eq!(r["BBB"], 0.0, epsilon = 1e-12);
        }

        #[test]
        fn missing_symbol_is_named() {
            let err = PriceMatrix::build(&two_symbol_table(), &symbols(&["AAA", "ZZZ"]), day(1))
                .unwrap_err();
            assert!(matches!(err, RankfolioError::MissingPriceHistory { symbol } if symbol == "ZZZ"));
        }

        #[test]
        fn no_rows_after_start_is_missing_history() {
            let err = PriceMatrix::build(&two_symbol_table(), &symbols(&["AAA"]), day(20))
                .unwrap_err();
            assert!(matches!(err, RankfolioError::MissingPriceHistory { .. }));
        }

        #[test]
        fn disjoint_histories_have_no_common_dates() {
            let table: PriceTable = vec![
                series("AAA", &[(1, 1.0), (2, 1.0)]),
                series("BBB", &[(3, 1.0), (4, 1.0)]),
            ]
            .into_iter()
            .collect();
            let err = PriceMatrix::build(&table, &symbols(&["AAA", "BBB"]), day(1)).unwrap_err();
            assert!(matches!(err, RankfolioError::NoCommonHistory { symbols } if symbols.len() == 2));
        }

        #[test]
        fn union_keeps_every_trading_date() {
            let table: PriceTable = vec![
                series("AAA", &[(1, 100.0), (2, 110.0), (3, 121.0)]),
                series("NEW", &[(3, 10.0), (5, 12.0)]),
            ]
            .into_iter()
            .collect();

            let matrix =
                PriceMatrix::build_union(&table, &symbols(&["AAA", "NEW"]), day(1)).unwrap();
            assert_eq!(matrix.dates(), &[day(1), day(2), day(3), day(5)]);
            assert_eq!(matrix.close("NEW", 0), None);
            assert_eq!(matrix.close("NEW", 2), Some(10.0));
            assert!(matrix.trades_on("NEW", day(5)));
            assert!(!matrix.trades_on("AAA", day(5)));
            assert!(!matrix.trades_on("AAA", day(4)));
        }

        #[test]
        fn union_carries_prices_across_gaps() {
            let table: PriceTable = vec![
                series("AAA", &[(1, 100.0), (2, 110.0), (4, 121.0)]),
                series("BBB", &[(1, 50.0), (3, 55.0), (4, 55.0)]),
            ]
            .into_iter()
            .collect();

            let matrix =
                PriceMatrix::build_union(&table, &symbols(&["AAA", "BBB"]), day(1)).unwrap();
            // AAA is missing on day 3, so day 4 is measured against day 2.
            assert_eq!(matrix.returns_on(2)["AAA"], 0.0);
            assert_abs_diff_eq!(matrix.returns_on(3)["AAA"], 0.10, epsilon = 1e-12);
            // BBB is missing on day 2 and its first bar counts from day 1.
            assert_eq!(matrix.returns_on(1)["BBB"], 0.0);
            assert_abs_diff_eq!(matrix.returns_on(2)["BBB"], 0.10, epsilon = 1e-12);
        }

        #[test]
        fn union_skips_symbols_without_rows() {
            let matrix =
                PriceMatrix::build_union(&two_symbol_table(), &symbols(&["AAA", "ZZZ"]), day(1))
                    .unwrap();
            assert_eq!(matrix.symbols(), &["AAA".to_string()]);
            assert_eq!(matrix.len(), 4);
        }

        #[test]
        fn disjoint_histories_union_without_error() {
            let table: PriceTable = vec![
                series("AAA", &[(1, 1.0), (2, 1.0)]),
                series("LATE", &[(8, 1.0), (9, 1.0)]),
            ]
            .into_iter()
            .collect();
            let matrix =
                PriceMatrix::build_union(&table, &symbols(&["AAA", "LATE"]), day(1)).unwrap();
            assert_eq!(matrix.len(), 4);
        }

        #[test]
        fn union_with_no_rows_has_no_common_history() {
            let err = PriceMatrix::build_union(&two_symbol_table(), &symbols(&["ZZZ"]), day(1))
                .unwrap_err();
            assert!(matches!(err, RankfolioError::NoCommonHistory { symbols } if symbols == ["ZZZ"]));
        }

        #[test]
        fn empty_symbol_list() {
            let err = PriceMatrix::build(&two_symbol_table(), &[], day(1)).unwrap_err();
            assert!(matches!(err, RankfolioError::NoCommonHistory { .. }));
        }
    }

    mod simulator {
        use super::*;

        #[test]
        fn single_instrument_tracks_price() {
            let matrix =
                PriceMatrix::build(&two_symbol_table(), &symbols(&["AAA"]), day(1)).unwrap();
            let event = generate_trades(day(1), &Allocation::all_cash(), &targets(&[("AAA", 1.0)]));
            let curve = simulate(&matrix, 100.0, &[event]).unwrap();

            let values: Vec<f64> = curve.iter().map(|p| p.value).collect();
            assert_eq!(curve.len(), 4);
            assert_abs_diff_eq!(values[0], 100.0);
            assert_abs_diff_eq!(values[1], 110.0, epsilon = 1e-9);
            assert_abs_diff_eq!(values[2], 121.0, epsilon = 1e-9);
            assert_abs_diff_eq!(values[3], 121.0, epsilon = 1e-9);
        }

        #[test]
        fn no_events_stays_in_cash() {
            let matrix =
                PriceMatrix::build(&two_symbol_table(), &symbols(&["AAA"]), day(1)).unwrap();
            let curve = simulate(&matrix, 1.0, &[]).unwrap();
            assert!(curve.iter().all(|p| p.value == 1.0));
        }

        #[test]
        fn drift_compounds_between_rebalances() {
            let matrix =
                PriceMatrix::build(&two_symbol_table(), &symbols(&["AAA", "BBB"]), day(1))
                    .unwrap();
            let event = generate_trades(
                day(1),
                &Allocation::all_cash(),
                &targets(&[("AAA", 0.5), ("BBB", 0.5)]),
            );
            let curve = simulate(&matrix, 1.0, &[event]).unwrap();

            // Day 2: AAA +10%, BBB flat.
            assert_abs_diff_eq!(curve[1].value, 1.05, epsilon = 1e-12);
            // Drifted weights: AAA 0.55/1.05, BBB 0.5/1.05. Day 3: AAA +10%, BBB -10%.
            let expected = 1.05 * (1.0 + (0.55 / 1.05) * 0.10 + (0.5 / 1.05) * -0.10);
            assert_abs_diff_eq!(curve[2].value, expected, epsilon = 1e-12);
            // Buy and hold equals the sum of each leg's growth.
            let held = 0.5 * (121.0 / 100.0) + 0.5 * (54.0 / 50.0);
            assert_abs_diff_eq!(curve[3].value, held, epsilon = 1e-12);
        }

        #[test]
        fn rebalance_resets_weights() {
            let matrix =
                PriceMatrix::build(&two_symbol_table(), &symbols(&["AAA", "BBB"]), day(1))
                    .unwrap();
            let initial = generate_trades(
                day(1),
                &Allocation::all_cash(),
                &targets(&[("AAA", 0.5), ("BBB", 0.5)]),
            );
            let held = initial.target_allocation();
            let second = generate_trades(day(2), &held, &targets(&[("BBB", 1.0)]));
            let curve = simulate(&matrix, 1.0, &[initial, second]).unwrap();

            assert_abs_diff_eq!(curve[1].value, 1.05, epsilon = 1e-12);
            assert_abs_diff_eq!(curve[2].value, 1.05 * 0.9, epsilon = 1e-12);
            assert_abs_diff_eq!(curve[3].value, 1.05 * 0.9 * 1.2, epsilon = 1e-12);
        }

        #[test]
        fn walk_reports_drifted_holdings() {
            let matrix =
                PriceMatrix::build(&two_symbol_table(), &symbols(&["AAA"]), day(1)).unwrap();
            let mut seen = Vec::new();
            walk(&matrix, 1.0, |date, holdings| {
                seen.push(holdings.weight("AAA"));
                if date == day(1) {
                    Ok(Some(Allocation::from_targets(&targets(&[("AAA", 0.5)]))))
                } else {
                    Ok(None)
                }
            })
            .unwrap();

            assert_eq!(seen[0], 0.0);
            assert_abs_diff_eq!(seen[1], 0.55 / 1.05, epsilon = 1e-12);
        }

        #[test]
        fn off_calendar_event_is_rejected() {
            let matrix =
                PriceMatrix::build(&two_symbol_table(), &symbols(&["AAA"]), day(1)).unwrap();
            let event = generate_trades(day(9), &Allocation::all_cash(), &targets(&[("AAA", 1.0)]));
            let err = simulate(&matrix, 1.0, &[event]).unwrap_err();
            assert!(matches!(err, RankfolioError::Data { .. }));
        }

        #[test]
        fn unknown_symbol_in_event_is_rejected() {
            let matrix =
                PriceMatrix::build(&two_symbol_table(), &symbols(&["AAA"]), day(1)).unwrap();
            let event = generate_trades(day(1), &Allocation::all_cash(), &targets(&[("CCC", 1.0)]));
            let err = simulate(&matrix, 1.0, &[event]).unwrap_err();
            assert!(matches!(err, RankfolioError::MissingPriceHistory { symbol } if symbol == "CCC"));
        }

        #[test]
        fn non_positive_initial_value_is_rejected() {
            let matrix =
                PriceMatrix::build(&two_symbol_table(), &symbols(&["AAA"]), day(1)).unwrap();
            assert!(matches!(
                simulate(&matrix, 0.0, &[]),
                Err(RankfolioError::InvalidInitialValue(_))
            ));
        }
    }
}
