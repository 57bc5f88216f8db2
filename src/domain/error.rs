//! Domain error types.

/// Coarse classification of a [`RankfolioError`], stable enough for callers
/// to branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any computation: bad feature names, weights, counts.
    Configuration,
    /// Fatal gap in the price data for this invocation.
    DataGap,
    /// The price source itself failed (unreadable file, bad row).
    Data,
    Io,
}

/// Top-level error type for rankfolio.
#[derive(Debug, thiserror::Error)]
pub enum RankfolioError {
    #[error("price table is empty: nothing to rank")]
    EmptyUniverse,

    #[error("unknown ranking feature: {name}")]
    UnknownFeature { name: String },

    #[error("at least one score component is required")]
    EmptyComponents,

    #[error("invalid score component {label}: {reason}")]
    InvalidComponent { label: String, reason: String },

    #[error("top_n must be positive, got {0}")]
    InvalidTopN(i64),

    #[error("manual allocation has {symbols} symbols but {weights} weights")]
    WeightCountMismatch { symbols: usize, weights: usize },

    #[error("invalid weight for {symbol}: {weight}")]
    InvalidWeight { symbol: String, weight: f64 },

    #[error("duplicate symbol in allocation: {0}")]
    DuplicateSymbol(String),

    #[error("invalid score bounds: min_score {min} exceeds max_score {max}")]
    InvalidScoreBounds { min: f64, max: f64 },

    #[error("initial value must be positive, got {0}")]
    InvalidInitialValue(f64),

    #[error("no common trading dates across {symbols:?}")]
    NoCommonHistory { symbols: Vec<String> },

    #[error("no price history for {symbol} on or after the start date")]
    MissingPriceHistory { symbol: String },

    #[error("price data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RankfolioError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RankfolioError::UnknownFeature { .. }
            | RankfolioError::EmptyComponents
            | RankfolioError::InvalidComponent { .. }
            | RankfolioError::InvalidTopN(_)
            | RankfolioError::WeightCountMismatch { .. }
            | RankfolioError::InvalidWeight { .. }
            | RankfolioError::DuplicateSymbol(_)
            | RankfolioError::InvalidScoreBounds { .. }
            | RankfolioError::InvalidInitialValue(_)
            | RankfolioError::ConfigParse { .. }
            | RankfolioError::ConfigMissing { .. }
            | RankfolioError::ConfigInvalid { .. } => ErrorKind::Configuration,
            RankfolioError::EmptyUniverse
            | RankfolioError::NoCommonHistory { .. }
            | RankfolioError::MissingPriceHistory { .. } => ErrorKind::DataGap,
            RankfolioError::Data { .. } | RankfolioError::Csv(_) => ErrorKind::Data,
            RankfolioError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<&RankfolioError> for std::process::ExitCode {
    fn from(err: &RankfolioError) -> Self {
        let code: u8 = match err.kind() {
            ErrorKind::Io => 1,
            ErrorKind::Configuration => 2,
            ErrorKind::Data => 3,
            ErrorKind::DataGap => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_share_a_kind() {
        let errs = [
            RankfolioError::UnknownFeature {
                name: "beta".into(),
            },
            RankfolioError::EmptyComponents,
            RankfolioError::InvalidTopN(0),
            RankfolioError::WeightCountMismatch {
                symbols: 2,
                weights: 1,
            },
        ];
        for err in &errs {
            assert_eq!(err.kind(), ErrorKind::Configuration, "{err}");
        }
    }

    #[test]
    fn missing_history_names_the_symbol() {
        let err = RankfolioError::MissingPriceHistory {
            symbol: "BHP".into(),
        };
        assert_eq!(err.kind(), ErrorKind::DataGap);
        assert!(err.to_string().contains("BHP"));
    }

    #[test]
    fn no_common_history_lists_symbols() {
        let err = RankfolioError::NoCommonHistory {
            symbols: vec!["AAA".into(), "BBB".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("AAA") && msg.contains("BBB"));
    }

    #[test]
    fn io_errors_convert_transparently() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: RankfolioError = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.to_string(), "gone");
    }
}
