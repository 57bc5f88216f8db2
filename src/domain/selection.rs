//! Universe filtering and top-N selection.
//!
//! Filters narrow the known universe (include, then exclude, then prefix
//! match). The selector intersects what survives with the ranked scores,
//! orders by score with a symbol tie-break, applies the inclusive score
//! bounds and finally truncates to `top_n`.

use crate::domain::error::RankfolioError;
use crate::domain::scoring::{RankedScore, ScoreComponent, validate_components};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SymbolListError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

/// Parses a comma separated symbol list, upper-casing each entry.
/// A blank input is an empty list.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, SymbolListError> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(SymbolListError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(SymbolListError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniverseFilters {
    /// When non-empty this replaces the known universe.
    pub include: BTreeSet<String>,
    pub exclude: BTreeSet<String>,
    /// When non-empty a symbol must start with one of these.
    pub prefixes: Vec<String>,
}

impl UniverseFilters {
    pub fn needs_known_universe(&self) -> bool {
        self.include.is_empty()
    }

    /// Exclude and prefix checks for a single symbol.
    pub fn admits(&self, symbol: &str) -> bool {
        if self.exclude.contains(symbol) {
            return false;
        }
        self.prefixes.is_empty() || self.prefixes.iter().any(|p| symbol.starts_with(p.as_str()))
    }

    /// Filtered universe in ascending symbol order.
    pub fn apply<'a, I>(&self, known: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let base: BTreeSet<String> = if self.include.is_empty() {
            known.into_iter().cloned().collect()
        } else {
            self.include.clone()
        };
        base.into_iter().filter(|s| self.admits(s)).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(format!("expected asc or desc, got {other:?}")),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Weighting {
    #[default]
    Equal,
    Score,
}

impl FromStr for Weighting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "equal" => Ok(Weighting::Equal),
            "score" => Ok(Weighting::Score),
            other => Err(format!("expected equal or score, got {other:?}")),
        }
    }
}

impl fmt::Display for Weighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Weighting::Equal => "equal",
            Weighting::Score => "score",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoSelectionConfig {
    pub top_n: usize,
    pub components: Vec<ScoreComponent>,
    pub weighting: Weighting,
    pub direction: Direction,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
}

impl AutoSelectionConfig {
    pub fn new(top_n: usize, components: Vec<ScoreComponent>) -> Self {
        AutoSelectionConfig {
            top_n,
            components,
            weighting: Weighting::default(),
            direction: Direction::default(),
            min_score: None,
            max_score: None,
        }
    }

    pub fn validate(&self) -> Result<(), RankfolioError> {
        if self.top_n == 0 {
            return Err(RankfolioError::InvalidTopN(0));
        }
        validate_components(&self.components)?;
        if let (Some(min), Some(max)) = (self.min_score, self.max_score) {
            if min > max {
                return Err(RankfolioError::InvalidScoreBounds { min, max });
            }
        }
        Ok(())
    }

    pub fn within_bounds(&self, score: f64) -> bool {
        self.min_score.is_none_or(|min| score >= min) && self.max_score.is_none_or(|max| score <= max)
    }

    pub fn max_lookback_days(&self) -> u32 {
        self.components
            .iter()
            .map(|c| c.lookback_days)
            .max()
            .unwrap_or(0)
    }

    /// Target weight per selected symbol, in selection order.
    ///
    /// Equal weighting hands each pick `1 / top_n`, so a short list leaves
    /// the remainder in cash. Score weighting splits the whole allocation in
    /// proportion to composite score, or equally when every score is zero.
    pub fn target_weights(&self, selected: &[Candidate]) -> Vec<(String, f64)> {
        if selected.is_empty() {
            return Vec::new();
        }
        match self.weighting {
            Weighting::Equal => {
                let w = 1.0 / self.top_n as f64;
                selected.iter().map(|c| (c.symbol.clone(), w)).collect()
            }
            Weighting::Score => {
                let total: f64 = selected.iter().map(|c| c.score.max(0.0)).sum();
                if total > 0.0 && total.is_finite() {
                    selected
                        .iter()
                        .map(|c| (c.symbol.clone(), c.score.max(0.0) / total))
                        .collect()
                } else {
                    let w = 1.0 / selected.len() as f64;
                    selected.iter().map(|c| (c.symbol.clone(), w)).collect()
                }
            }
        }
    }
}

/// Fixed weights chosen up front; renormalized to sum to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualAllocation {
    symbols: Vec<String>,
    weights: Vec<f64>,
}

impl ManualAllocation {
    pub fn new(symbols: Vec<String>, weights: Vec<f64>) -> Result<Self, RankfolioError> {
        if symbols.len() != weights.len() {
            return Err(RankfolioError::WeightCountMismatch {
                symbols: symbols.len(),
                weights: weights.len(),
            });
        }
        if symbols.is_empty() {
            return Err(RankfolioError::WeightCountMismatch {
                symbols: 0,
                weights: 0,
            });
        }
        let mut seen = HashSet::new();
        for (symbol, &weight) in symbols.iter().zip(&weights) {
            if !seen.insert(symbol.as_str()) {
                return Err(RankfolioError::DuplicateSymbol(symbol.clone()));
            }
            if !weight.is_finite() || weight < 0.0 {
                return Err(RankfolioError::InvalidWeight {
                    symbol: symbol.clone(),
                    weight,
                });
            }
        }
        Ok(ManualAllocation { symbols, weights })
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn target_weights(&self) -> Vec<(String, f64)> {
        let total: f64 = self.weights.iter().sum();
        let equal = 1.0 / self.symbols.len() as f64;
        self.symbols
            .iter()
            .zip(&self.weights)
            .map(|(symbol, &w)| {
                let normalized = if total > 0.0 { w / total } else { equal };
                (symbol.clone(), normalized)
            })
            .collect()
    }
}

/// How targets are produced on each rebalance date.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Auto(AutoSelectionConfig),
    Manual(ManualAllocation),
}

impl Selection {
    pub fn validate(&self) -> Result<(), RankfolioError> {
        match self {
            Selection::Auto(config) => config.validate(),
            Selection::Manual(_) => Ok(()),
        }
    }

    pub fn max_lookback_days(&self) -> u32 {
        match self {
            Selection::Auto(config) => config.max_lookback_days(),
            Selection::Manual(_) => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub symbol: String,
    pub score: f64,
}

/// Picks up to `top_n` symbols from `scores` that survive `filters`.
/// Never pads: fewer survivors, or none at all, is a normal outcome.
pub fn select(
    universe: &[String],
    filters: &UniverseFilters,
    scores: &[RankedScore],
    config: &AutoSelectionConfig,
) -> Vec<Candidate> {
    let eligible: BTreeSet<String> = filters.apply(universe).into_iter().collect();

    let mut candidates: Vec<Candidate> = scores
        .iter()
        .filter(|s| eligible.contains(&s.symbol))
        .map(|s| Candidate {
            symbol: s.symbol.clone(),
            score: s.composite,
        })
        .collect();

    candidates.sort_by(|a, b| {
        let by_score = match config.direction {
            Direction::Desc => b.score.total_cmp(&a.score),
            Direction::Asc => a.score.total_cmp(&b.score),
        };
        by_score.then_with(|| a.symbol.cmp(&b.symbol))
    });
    candidates.retain(|c| config.within_bounds(c.score));
    candidates.truncate(config.top_n);
    candidates
}
