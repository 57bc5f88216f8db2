//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestConfig, BacktestResult};
use crate::domain::config::{
    build_backtest_config, build_components, build_universe_filters, data_path,
    validate_backtest_config, validate_rank_config,
};
use crate::domain::engine;
use crate::domain::error::RankfolioError;
use crate::domain::feature::Feature;
use crate::domain::scoring::RankedScore;
use crate::domain::selection::Selection;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PriceHistoryPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "rankfolio", about = "Ranking-driven portfolio backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for equity.csv, rebalances.csv and stats.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Validate the configuration without fetching data
        #[arg(long)]
        dry_run: bool,
    },
    /// Preview the composite ranking of the configured universe
    Rank {
        #[arg(short, long)]
        config: PathBuf,
        /// Show only the top N instruments
        #[arg(short, long)]
        limit: Option<usize>,
        /// Rank using data up to this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date_arg)]
        as_of: Option<NaiveDate>,
    },
    /// List the available ranking features
    Features,
    /// List symbols available in a price data directory
    ListSymbols {
        #[arg(short, long)]
        data: PathBuf,
    },
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("invalid date {s:?}, expected YYYY-MM-DD"))
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(&config, output.as_deref())
            }
        }
        Command::Rank {
            config,
            limit,
            as_of,
        } => run_rank(&config, limit, as_of),
        Command::Features => run_features(),
        Command::ListSymbols { data } => run_list_symbols(&data),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = RankfolioError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: RankfolioError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

fn run_backtest(config_path: &Path, output_path: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let (data_dir, bt_config) = match data_path(&config)
        .and_then(|dir| build_backtest_config(&config).map(|bt| (dir, bt)))
    {
        Ok(v) => v,
        Err(e) => return fail(e),
    };

    let port = CsvPriceAdapter::new(data_dir);
    run_backtest_pipeline(&port, &bt_config, output_path)
}

/// Runs the backtest against `port`, prints the summary, and writes the CSV
/// report when `output_path` is set.
pub fn run_backtest_pipeline(
    port: &dyn PriceHistoryPort,
    bt_config: &BacktestConfig,
    output_path: Option<&Path>,
) -> ExitCode {
    eprintln!(
        "Running backtest from {} ({} rebalance)",
        bt_config.start_date, bt_config.frequency
    );

    let result = match engine::backtest(port, bt_config) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    print_summary(&result);

    if let Some(output) = output_path {
        if let Err(e) = CsvReportAdapter::new().write(&result, output) {
            eprintln!("error: failed to write report: {e}");
            return ExitCode::from(&e);
        }
        eprintln!("\nReport written to: {}", output.display());
    }

    ExitCode::SUCCESS
}

fn print_summary(result: &BacktestResult) {
    let stats = &result.stats;
    let first = result.equity.first().map(|p| p.date.to_string());
    let last = result.equity.last().map(|p| p.date.to_string());

    eprintln!("\n=== Backtest Results ===");
    eprintln!(
        "Period:           {} to {} ({} days)",
        first.unwrap_or_default(),
        last.unwrap_or_default(),
        result.equity.len()
    );
    eprintln!("Start Value:      {:.4}", stats.start_value);
    eprintln!("End Value:        {:.4}", stats.end_value);
    eprintln!("Total Return:     {:.2}%", stats.total_return * 100.0);
    eprintln!("CAGR:             {:.2}%", stats.cagr * 100.0);
    eprintln!("Volatility:       {:.2}%", stats.volatility * 100.0);
    eprintln!("Return/Vol:       {:.2}", stats.risk_adjusted_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", stats.max_drawdown * 100.0);
    eprintln!("Drawdown Length:  {} days", stats.max_drawdown_duration);

    match &result.rebalances {
        Some(events) => {
            eprintln!("\n=== Rebalances ({}) ===", events.len());
            for event in events {
                let held: Vec<String> = event
                    .trades
                    .iter()
                    .filter(|t| !t.is_cash() && t.target_weight > 0.0)
                    .map(|t| format!("{} {:.1}%", t.symbol, t.target_weight * 100.0))
                    .collect();
                eprintln!(
                    "  {}  {}  (cash {:.1}%)",
                    event.date,
                    if held.is_empty() {
                        "-".to_string()
                    } else {
                        held.join(", ")
                    },
                    event.cash_weight() * 100.0
                );
            }
        }
        None => eprintln!("\nBuy and hold: no rebalances after the initial allocation"),
    }
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&config) {
        return fail(e);
    }
    eprintln!("Config validated successfully");

    let bt_config = match build_backtest_config(&config) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    eprintln!("\nBacktest:");
    eprintln!("  start_date:    {}", bt_config.start_date);
    eprintln!("  rebalance:     {}", bt_config.frequency);
    eprintln!("  initial_value: {}", bt_config.initial_value);

    match &bt_config.selection {
        Selection::Auto(auto) => {
            eprintln!("\nAuto selection:");
            eprintln!("  top_n:      {}", auto.top_n);
            eprintln!("  weighting:  {}", auto.weighting);
            eprintln!("  direction:  {}", auto.direction);
            if let Some(min) = auto.min_score {
                eprintln!("  min_score:  {min}");
            }
            if let Some(max) = auto.max_score {
                eprintln!("  max_score:  {max}");
            }
            eprintln!("  components:");
            for component in &auto.components {
                eprintln!("    {component}");
            }
        }
        Selection::Manual(manual) => {
            eprintln!("\nManual allocation:");
            for (symbol, weight) in manual.target_weights() {
                eprintln!("  {symbol}: {:.2}%", weight * 100.0);
            }
        }
    }

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_rank(config_path: &Path, limit: Option<usize>, as_of: Option<NaiveDate>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    match rank_from_config(&config, as_of) {
        Ok(scores) => {
            print_ranking(&scores, limit);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Builds the ranking inputs from `config` and ranks the CSV universe.
pub fn rank_from_config(
    config: &dyn ConfigPort,
    as_of: Option<NaiveDate>,
) -> Result<Vec<RankedScore>, RankfolioError> {
    validate_rank_config(config)?;
    let port = CsvPriceAdapter::new(data_path(config)?);
    let components = build_components(config)?;
    let filters = build_universe_filters(config)?;
    engine::rank(&port, &components, &filters, as_of)
}

fn print_ranking(scores: &[RankedScore], limit: Option<usize>) {
    let shown = limit.unwrap_or(scores.len()).min(scores.len());
    let Some(first) = scores.first() else {
        eprintln!("No instruments could be ranked");
        return;
    };

    let mut header = format!("{:>4}  {:<10} {:>9}", "rank", "symbol", "composite");
    for feature in &first.features {
        header.push_str(&format!("  {:>24}", feature.label));
    }
    println!("{header}");

    for (i, score) in scores.iter().take(shown).enumerate() {
        let mut line = format!("{:>4}  {:<10} {:>9.4}", i + 1, score.symbol, score.composite);
        for feature in &score.features {
            line.push_str(&format!(
                "  {:>24}",
                format!("{:.4} ({:.3})", feature.raw, feature.normalized)
            ));
        }
        println!("{line}");
    }
    eprintln!("{} of {} instruments shown", shown, scores.len());
}

fn run_features() -> ExitCode {
    for feature in Feature::ALL {
        println!("{:<16} {}", feature.name(), feature.description());
    }
    ExitCode::SUCCESS
}

fn run_list_symbols(data_dir: &Path) -> ExitCode {
    let adapter = CsvPriceAdapter::new(data_dir);
    match adapter.list_known_universe() {
        Ok(symbols) if symbols.is_empty() => {
            eprintln!("No symbols found in {}", data_dir.display());
            ExitCode::SUCCESS
        }
        Ok(symbols) => {
            for symbol in &symbols {
                println!("{symbol}");
            }
            eprintln!("{} symbols found", symbols.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}
