//! Configuration loading and validation.
//!
//! Builds the backtest and ranking inputs from a [`ConfigPort`], validating
//! every field before any price data is fetched. Failures name the INI
//! section and key at fault.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::RankfolioError;
use crate::domain::schedule::RebalanceFrequency;
use crate::domain::scoring::{ScoreComponent, validate_components};
use crate::domain::selection::{
    AutoSelectionConfig, ManualAllocation, Selection, UniverseFilters, parse_symbols,
};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::path::PathBuf;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_INITIAL_VALUE: f64 = 1.0;

fn missing(section: &str, key: &str) -> RankfolioError {
    RankfolioError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> RankfolioError {
    RankfolioError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Non-blank value for `key`, trimmed.
fn get_value(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, RankfolioError> {
    get_value(config, section, key).ok_or_else(|| missing(section, key))
}

fn parse_optional_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, RankfolioError> {
    get_value(config, section, key)
        .map(|raw| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid(section, key, format!("expected a number, got {raw:?}")))
        })
        .transpose()
}

/// Checks everything a backtest run needs, including the data directory.
pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), RankfolioError> {
    data_path(config)?;
    build_backtest_config(config)?;
    Ok(())
}

/// Checks everything a ranking preview needs.
pub fn validate_rank_config(config: &dyn ConfigPort) -> Result<(), RankfolioError> {
    data_path(config)?;
    build_components(config)?;
    build_universe_filters(config)?;
    Ok(())
}

/// `[data] path`: directory of per-symbol CSV files.
pub fn data_path(config: &dyn ConfigPort) -> Result<PathBuf, RankfolioError> {
    require(config, "data", "path").map(PathBuf::from)
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, RankfolioError> {
    let start_date = parse_start_date(config)?;
    let frequency = parse_rebalance(config)?;
    let initial_value = parse_initial_value(config)?;
    let selection = build_selection(config)?;
    let filters = build_universe_filters(config)?;

    Ok(BacktestConfig {
        start_date,
        frequency,
        selection,
        filters,
        initial_value,
    })
}

fn parse_start_date(config: &dyn ConfigPort) -> Result<NaiveDate, RankfolioError> {
    let raw = require(config, "backtest", "start_date")?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|_| {
        invalid(
            "backtest",
            "start_date",
            "invalid start_date format, expected YYYY-MM-DD",
        )
    })
}

fn parse_rebalance(config: &dyn ConfigPort) -> Result<RebalanceFrequency, RankfolioError> {
    match get_value(config, "backtest", "rebalance") {
        None => Ok(RebalanceFrequency::default()),
        Some(raw) => raw
            .parse()
            .map_err(|reason: String| invalid("backtest", "rebalance", reason)),
    }
}

fn parse_initial_value(config: &dyn ConfigPort) -> Result<f64, RankfolioError> {
    let value = parse_optional_f64(config, "backtest", "initial_value")?
        .unwrap_or(DEFAULT_INITIAL_VALUE);
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_value",
            "initial_value must be positive",
        ));
    }
    Ok(value)
}

/// `[universe] include, exclude, prefixes`. Symbols and prefixes are
/// upper-cased.
pub fn build_universe_filters(config: &dyn ConfigPort) -> Result<UniverseFilters, RankfolioError> {
    let symbol_set = |key: &str| {
        let raw = config.get_string("universe", key).unwrap_or_default();
        parse_symbols(&raw)
            .map(|list| list.into_iter().collect::<BTreeSet<String>>())
            .map_err(|e| invalid("universe", key, e.to_string()))
    };

    Ok(UniverseFilters {
        include: symbol_set("include")?,
        exclude: symbol_set("exclude")?,
        prefixes: config
            .get_list("universe", "prefixes")
            .into_iter()
            .map(|p| p.to_uppercase())
            .collect(),
    })
}

/// `[selection] components`: comma list of `metric:lookback_days[:weight]`.
/// The weight defaults to 1.
pub fn build_components(config: &dyn ConfigPort) -> Result<Vec<ScoreComponent>, RankfolioError> {
    let items = config.get_list("selection", "components");
    if items.is_empty() {
        return Err(missing("selection", "components"));
    }

    let components = items
        .iter()
        .map(String::as_str)
        .map(parse_component)
        .collect::<Result<Vec<_>, _>>()?;
    validate_components(&components)?;
    Ok(components)
}

fn parse_component(item: &str) -> Result<ScoreComponent, RankfolioError> {
    let parts: Vec<&str> = item.split(':').map(str::trim).collect();
    let (metric, lookback, weight) = match parts.as_slice() {
        [metric, lookback] => (*metric, *lookback, None),
        [metric, lookback, weight] => (*metric, *lookback, Some(*weight)),
        _ => {
            return Err(invalid(
                "selection",
                "components",
                format!("expected metric:lookback_days[:weight], got {item:?}"),
            ));
        }
    };

    let lookback_days: u32 = lookback.parse().map_err(|_| {
        invalid(
            "selection",
            "components",
            format!("invalid lookback {lookback:?} in {item:?}"),
        )
    })?;
    let weight: f64 = match weight {
        None => 1.0,
        Some(raw) => raw.parse().map_err(|_| {
            invalid(
                "selection",
                "components",
                format!("invalid weight {raw:?} in {item:?}"),
            )
        })?,
    };

    ScoreComponent::parse(metric, lookback_days, weight)
}

pub fn build_auto_selection(config: &dyn ConfigPort) -> Result<AutoSelectionConfig, RankfolioError> {
    let raw_top_n = require(config, "selection", "top_n")?;
    let top_n: i64 = raw_top_n.parse().map_err(|_| {
        invalid(
            "selection",
            "top_n",
            format!("expected an integer, got {raw_top_n:?}"),
        )
    })?;
    if top_n <= 0 {
        return Err(RankfolioError::InvalidTopN(top_n));
    }

    let mut selection = AutoSelectionConfig::new(top_n as usize, build_components(config)?);
    if let Some(raw) = get_value(config, "selection", "weighting") {
        selection.weighting = raw
            .parse()
            .map_err(|reason: String| invalid("selection", "weighting", reason))?;
    }
    if let Some(raw) = get_value(config, "selection", "direction") {
        selection.direction = raw
            .parse()
            .map_err(|reason: String| invalid("selection", "direction", reason))?;
    }
    selection.min_score = parse_optional_f64(config, "selection", "min_score")?;
    selection.max_score = parse_optional_f64(config, "selection", "max_score")?;

    selection.validate()?;
    Ok(selection)
}

/// `[manual] symbols, weights`: comma lists of equal length.
pub fn build_manual_allocation(config: &dyn ConfigPort) -> Result<ManualAllocation, RankfolioError> {
    let raw_symbols = require(config, "manual", "symbols")?;
    let symbols =
        parse_symbols(&raw_symbols).map_err(|e| invalid("manual", "symbols", e.to_string()))?;

    let weights = config
        .get_list("manual", "weights")
        .iter()
        .map(|raw| {
            raw.parse::<f64>()
                .map_err(|_| invalid("manual", "weights", format!("invalid weight {raw:?}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if weights.is_empty() {
        return Err(missing("manual", "weights"));
    }

    ManualAllocation::new(symbols, weights)
}

/// `[selection] mode`: `auto` (default) or `manual`.
pub fn build_selection(config: &dyn ConfigPort) -> Result<Selection, RankfolioError> {
    let mode = get_value(config, "selection", "mode")
        .unwrap_or_else(|| "auto".to_string())
        .to_lowercase();
    match mode.as_str() {
        "auto" => Ok(Selection::Auto(build_auto_selection(config)?)),
        "manual" => Ok(Selection::Manual(build_manual_allocation(config)?)),
        other => Err(invalid(
            "selection",
            "mode",
            format!("expected auto or manual, got {other:?}"),
        )),
    }
}
