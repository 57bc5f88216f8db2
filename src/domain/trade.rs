//! Rebalance trade intents.
//!
//! A [`RebalanceEvent`] lists, in order: every target symbol in selection
//! order, then every previously held symbol that dropped out (as a sell to
//! zero, ascending by symbol), then the cash leg. The cash leg is always
//! present so callers can reconcile the full allocation from one event.

use crate::domain::portfolio::{Allocation, CASH_SYMBOL};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;

/// Annotation carried only by the cash leg.
pub const CASH_NOTE: &str = "idle cash for trading";

/// Weight changes smaller than this are reported as holds.
pub const HOLD_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
            TradeAction::Hold => "hold",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub action: TradeAction,
    pub target_weight: f64,
    pub note: Option<String>,
}

impl Trade {
    pub fn is_cash(&self) -> bool {
        self.symbol == CASH_SYMBOL
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceEvent {
    pub date: NaiveDate,
    pub trades: Vec<Trade>,
}

impl RebalanceEvent {
    /// Sum of every trade's target weight, cash leg included.
    pub fn total_weight(&self) -> f64 {
        self.trades.iter().map(|t| t.target_weight).sum()
    }

    pub fn cash_weight(&self) -> f64 {
        self.trades
            .iter()
            .find(|t| t.is_cash())
            .map(|t| t.target_weight)
            .unwrap_or(0.0)
    }

    /// The allocation the portfolio holds right after this event.
    /// Exited symbols (target 0) are not carried over.
    pub fn target_allocation(&self) -> Allocation {
        let mut allocation = Allocation {
            weights: Default::default(),
            cash: 0.0,
        };
        for trade in &self.trades {
            if trade.is_cash() {
                allocation.cash = trade.target_weight;
            } else if trade.target_weight > 0.0 {
                allocation
                    .weights
                    .insert(trade.symbol.clone(), trade.target_weight);
            }
        }
        allocation
    }
}

pub fn classify(previous: f64, target: f64) -> TradeAction {
    if (target - previous).abs() <= HOLD_TOLERANCE {
        TradeAction::Hold
    } else if target > previous {
        TradeAction::Buy
    } else {
        TradeAction::Sell
    }
}

/// Compares the drifted `previous` allocation with `targets` and emits the
/// trades needed on `date`. An empty target list moves everything to cash.
pub fn generate_trades(
    date: NaiveDate,
    previous: &Allocation,
    targets: &[(String, f64)],
) -> RebalanceEvent {
    let mut trades = Vec::with_capacity(targets.len() + previous.weights.len() + 1);
    let mut targeted = HashSet::new();

    for (symbol, weight) in targets {
        let weight = weight.max(0.0);
        targeted.insert(symbol.as_str());
        trades.push(Trade {
            symbol: symbol.clone(),
            action: classify(previous.weight(symbol), weight),
            target_weight: weight,
            note: None,
        });
    }

    // BTreeMap iteration keeps exits in ascending symbol order.
    for (symbol, &held) in &previous.weights {
        if targeted.contains(symbol.as_str()) || held <= 0.0 {
            continue;
        }
        trades.push(Trade {
            symbol: symbol.clone(),
            action: TradeAction::Sell,
            target_weight: 0.0,
            note: None,
        });
    }

    let invested: f64 = targets.iter().map(|(_, w)| w.max(0.0)).sum();
    let cash = (1.0 - invested).max(0.0);
    trades.push(Trade {
        symbol: CASH_SYMBOL.to_string(),
        action: classify(previous.cash, cash),
        target_weight: cash,
        note: Some(CASH_NOTE.to_string()),
    });

    RebalanceEvent { date, trades }
}
