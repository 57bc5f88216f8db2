//! Summary statistics over a simulated equity curve.
//!
//! The risk-adjusted ratio is `CAGR / annualized volatility` with no
//! risk-free rate subtracted; it is not a Sharpe ratio.

use super::feature::sample_stddev;
use super::portfolio::EquityPoint;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const DAYS_PER_YEAR: f64 = 365.25;
const MIN_VOLATILITY: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub start_value: f64,
    pub end_value: f64,
    pub total_return: f64,
    pub cagr: f64,
    /// Worst peak-to-trough decline as a positive fraction.
    pub max_drawdown: f64,
    /// Longest run of consecutive points spent below a prior peak.
    pub max_drawdown_duration: i64,
    pub volatility: f64,
    pub risk_adjusted_ratio: f64,
}

impl Stats {
    pub fn compute(equity_curve: &[EquityPoint]) -> Self {
        let (start_value, end_value) = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) => (first.value, last.value),
            _ => (0.0, 0.0),
        };

        let total_return = if start_value > 0.0 {
            end_value / start_value - 1.0
        } else {
            0.0
        };

        let cagr = compute_cagr(equity_curve);
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);
        let volatility = compute_volatility(equity_curve);

        let risk_adjusted_ratio = if volatility > MIN_VOLATILITY {
            cagr / volatility
        } else {
            0.0
        };

        Stats {
            start_value,
            end_value,
            total_return,
            cagr,
            max_drawdown,
            max_drawdown_duration,
            volatility,
            risk_adjusted_ratio,
        }
    }
}

/// Growth of the curve relative to its first value, annualized over
/// calendar days.
fn compute_cagr(equity_curve: &[EquityPoint]) -> f64 {
    let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    let elapsed_days = (last.date - first.date).num_days();
    if elapsed_days <= 0 || first.value <= 0.0 {
        return 0.0;
    }
    let growth = last.value / first.value;
    let cagr = growth.powf(DAYS_PER_YEAR / elapsed_days as f64) - 1.0;
    if cagr.is_finite() { cagr } else { 0.0 }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, i64) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.value;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for point in equity_curve {
        if point.value >= peak {
            peak = point.value;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max(1.0 - point.value / peak);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}

fn compute_volatility(equity_curve: &[EquityPoint]) -> f64 {
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].value;
            if prev > 0.0 {
                w[1].value / prev - 1.0
            } else {
                0.0
            }
        })
        .collect();

    sample_stddev(&returns) * TRADING_DAYS_PER_YEAR.sqrt()
}
