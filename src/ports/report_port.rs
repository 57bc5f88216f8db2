//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::RankfolioError;
use std::path::Path;

/// Port for persisting a finished backtest.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), RankfolioError>;
}
