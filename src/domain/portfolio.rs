//! Portfolio weights, drift between rebalances, and the equity curve point.

use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Reserved symbol for the synthetic cash leg.
pub const CASH_SYMBOL: &str = "$CASH";

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Fractions of current portfolio value held per symbol, plus cash.
/// Instrument weights and cash sum to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub weights: BTreeMap<String, f64>,
    pub cash: f64,
}

impl Default for Allocation {
    fn default() -> Self {
        Allocation::all_cash()
    }
}

impl Allocation {
    pub fn all_cash() -> Self {
        Allocation {
            weights: BTreeMap::new(),
            cash: 1.0,
        }
    }

    /// Builds an allocation from instrument targets; whatever they leave
    /// unallocated goes to cash.
    pub fn from_targets(targets: &[(String, f64)]) -> Self {
        let weights: BTreeMap<String, f64> = targets
            .iter()
            .map(|(symbol, w)| (symbol.clone(), w.max(0.0)))
            .collect();
        let invested: f64 = weights.values().sum();
        Allocation {
            weights,
            cash: (1.0 - invested).max(0.0),
        }
    }

    pub fn weight(&self, symbol: &str) -> f64 {
        self.weights.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn invested(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn total(&self) -> f64 {
        self.invested() + self.cash
    }

    /// `Σ w_i * r_i`; symbols without a return contribute nothing.
    pub fn portfolio_return(&self, returns: &BTreeMap<String, f64>) -> f64 {
        self.weights
            .iter()
            .map(|(symbol, w)| w * returns.get(symbol).copied().unwrap_or(0.0))
            .sum()
    }

    /// Weights after one day of price movement, renormalized so that cash
    /// (zero return) and positions again sum to 1. Falls back to `target`
    /// when the whole portfolio has been wiped out.
    pub fn drift(&self, returns: &BTreeMap<String, f64>, target: &Allocation) -> Allocation {
        let grown: BTreeMap<String, f64> = self
            .weights
            .iter()
            .map(|(symbol, w)| {
                let r = returns.get(symbol).copied().unwrap_or(0.0);
                (symbol.clone(), w * (1.0 + r))
            })
            .collect();
        let denominator = grown.values().sum::<f64>() + self.cash;

        if denominator <= 0.0 || !denominator.is_finite() {
            return target.clone();
        }

        Allocation {
            weights: grown
                .into_iter()
                .map(|(symbol, w)| (symbol, w / denominator))
                .collect(),
            cash: self.cash / denominator,
        }
    }
}
