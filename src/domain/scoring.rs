//! Composite scoring: cross-sectional min-max normalization of each
//! configured feature, combined into one weighted score per instrument.

use crate::domain::error::RankfolioError;
use crate::domain::feature::Feature;
use crate::domain::price_series::PriceTable;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// `max - min` at or below this counts as a flat cross-section.
pub const FLAT_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreComponent {
    pub feature: Feature,
    pub lookback_days: u32,
    pub weight: f64,
}

impl ScoreComponent {
    pub fn new(feature: Feature, lookback_days: u32, weight: f64) -> Self {
        ScoreComponent {
            feature,
            lookback_days,
            weight,
        }
    }

    /// Resolves `metric` against the feature registry.
    pub fn parse(metric: &str, lookback_days: u32, weight: f64) -> Result<Self, RankfolioError> {
        let component = ScoreComponent::new(metric.parse()?, lookback_days, weight);
        component.validate()?;
        Ok(component)
    }

    /// Identifies the component in score breakdowns, e.g. `momentum_20d`.
    pub fn label(&self) -> String {
        format!("{}_{}d", self.feature, self.lookback_days)
    }

    pub fn validate(&self) -> Result<(), RankfolioError> {
        if self.lookback_days == 0 {
            return Err(RankfolioError::InvalidComponent {
                label: self.label(),
                reason: "lookback_days must be positive".into(),
            });
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(RankfolioError::InvalidComponent {
                label: self.label(),
                reason: format!("weight must be non-negative, got {}", self.weight),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ScoreComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.feature, self.lookback_days, self.weight)
    }
}

pub fn validate_components(components: &[ScoreComponent]) -> Result<(), RankfolioError> {
    if components.is_empty() {
        return Err(RankfolioError::EmptyComponents);
    }
    components.iter().try_for_each(ScoreComponent::validate)
}

/// Weight fractions summing to 1. Falls back to an equal split when the
/// configured weights sum to zero.
pub fn component_fractions(components: &[ScoreComponent]) -> Vec<f64> {
    let total: f64 = components.iter().map(|c| c.weight).sum();
    if total > 0.0 {
        components.iter().map(|c| c.weight / total).collect()
    } else {
        let equal = 1.0 / components.len() as f64;
        vec![equal; components.len()]
    }
}

/// Min-max rescale to [0, 1] across the cross-section.
///
/// Non-finite raw values are left out of the min/max and map to 0. A flat
/// cross-section maps every finite value to 1.
pub fn normalize_min_max(raw: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let finite = raw.values().copied().filter(|v| v.is_finite());
    let (min, max) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let flat = max - min <= FLAT_TOLERANCE;

    raw.iter()
        .map(|(symbol, &value)| {
            let normalized = if !value.is_finite() {
                0.0
            } else if flat {
                1.0
            } else {
                ((value - min) / (max - min)).clamp(0.0, 1.0)
            };
            (symbol.clone(), normalized)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureScore {
    pub label: String,
    pub raw: f64,
    pub normalized: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedScore {
    pub symbol: String,
    pub composite: f64,
    /// One entry per configured component, in configuration order.
    pub features: Vec<FeatureScore>,
}

/// Ranks every instrument in `table` as of its most recent date.
pub fn compute_ranking(
    table: &PriceTable,
    components: &[ScoreComponent],
) -> Result<Vec<RankedScore>, RankfolioError> {
    let as_of = table.last_date().ok_or(RankfolioError::EmptyUniverse)?;
    compute_ranking_as_of(table, components, as_of)
}

/// Ranks instruments using only bars dated on or before `as_of`.
///
/// Output is ordered by composite score descending, ties by symbol.
/// Instruments with no bars up to `as_of` are left out.
pub fn compute_ranking_as_of(
    table: &PriceTable,
    components: &[ScoreComponent],
    as_of: NaiveDate,
) -> Result<Vec<RankedScore>, RankfolioError> {
    validate_components(components)?;
    if table.is_empty() {
        return Err(RankfolioError::EmptyUniverse);
    }

    let fractions = component_fractions(components);
    let mut ranked: BTreeMap<String, RankedScore> = BTreeMap::new();

    for (component, fraction) in components.iter().zip(&fractions) {
        let raw = component
            .feature
            .compute_table(table, as_of, component.lookback_days);
        let normalized = normalize_min_max(&raw);
        let label = component.label();

        for (symbol, &raw_value) in &raw {
            let norm = normalized.get(symbol).copied().unwrap_or(0.0);
            let entry = ranked
                .entry(symbol.clone())
                .or_insert_with(|| RankedScore {
                    symbol: symbol.clone(),
                    composite: 0.0,
                    features: Vec::with_capacity(components.len()),
                });
            entry.composite += norm * fraction;
            entry.features.push(FeatureScore {
                label: label.clone(),
                raw: raw_value,
                normalized: norm,
            });
        }
    }

    let mut scores: Vec<RankedScore> = ranked.into_values().collect();
    sort_descending(&mut scores);
    debug!(%as_of, instruments = scores.len(), "computed composite ranking");
    Ok(scores)
}

fn sort_descending(scores: &mut [RankedScore]) {
    scores.sort_by(|a, b| {
        b.composite
            .total_cmp(&a.composite)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}
