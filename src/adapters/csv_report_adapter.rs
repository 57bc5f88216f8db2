//! CSV report adapter.
//!
//! Writes a finished backtest as three files in the output directory:
//! `equity.csv` (date, value), `rebalances.csv` (one row per trade) and
//! `stats.csv` (metric, value). Runs that report no rebalances get no
//! `rebalances.csv`.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::RankfolioError;
use crate::domain::metrics::Stats;
use crate::domain::portfolio::EquityPoint;
use crate::domain::trade::RebalanceEvent;
use crate::ports::report_port::ReportPort;
use std::fs;
use std::path::Path;
use tracing::info;

pub const EQUITY_FILE: &str = "equity.csv";
pub const REBALANCES_FILE: &str = "rebalances.csv";
pub const STATS_FILE: &str = "stats.csv";

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), RankfolioError> {
        fs::create_dir_all(output_dir)?;

        write_equity(&result.equity, &output_dir.join(EQUITY_FILE))?;
        if let Some(events) = &result.rebalances {
            write_rebalances(events, &output_dir.join(REBALANCES_FILE))?;
        }
        write_stats(&result.stats, &output_dir.join(STATS_FILE))?;

        info!(dir = %output_dir.display(), "report written");
        Ok(())
    }
}

fn write_equity(curve: &[EquityPoint], path: &Path) -> Result<(), RankfolioError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["date", "value"])?;
    for point in curve {
        wtr.write_record([point.date.to_string(), point.value.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_rebalances(events: &[RebalanceEvent], path: &Path) -> Result<(), RankfolioError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["date", "symbol", "action", "target_weight", "note"])?;
    for event in events {
        for trade in &event.trades {
            wtr.write_record([
                event.date.to_string(),
                trade.symbol.clone(),
                trade.action.to_string(),
                trade.target_weight.to_string(),
                trade.note.clone().unwrap_or_default(),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

fn write_stats(stats: &Stats, path: &Path) -> Result<(), RankfolioError> {
    let rows = [
        ("start_value", stats.start_value),
        ("end_value", stats.end_value),
        ("total_return", stats.total_return),
        ("cagr", stats.cagr),
        ("max_drawdown", stats.max_drawdown),
        ("max_drawdown_duration", stats.max_drawdown_duration as f64),
        ("volatility", stats.volatility),
        ("risk_adjusted_ratio", stats.risk_adjusted_ratio),
    ];

    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["metric", "value"])?;
    for (name, value) in rows {
        wtr.write_record([name.to_string(), value.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}
