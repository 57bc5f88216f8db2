//! Daily OHLCV bar representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// `None` when the source has no volume column.
    pub volume: Option<f64>,
}

impl OhlcvBar {
    /// A bar carrying only a close; open/high/low mirror it.
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        OhlcvBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: None,
        }
    }

    /// Close-to-close simple return against `prev_close`.
    ///
    /// A non-positive or non-finite previous close yields 0 rather than an
    /// infinite return.
    pub fn return_since(&self, prev_close: f64) -> f64 {
        if prev_close > 0.0 && prev_close.is_finite() {
            self.close / prev_close - 1.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar(close: f64) -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close,
            volume: Some(50_000.0),
        }
    }

    #[test]
    fn from_close_mirrors_price() {
        let bar = OhlcvBar::from_close(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 42.0);
        assert_eq!(bar.open, 42.0);
        assert_eq!(bar.high, 42.0);
        assert_eq!(bar.low, 42.0);
        assert_eq!(bar.volume, None);
    }

    #[test]
    fn return_since_gain() {
        let bar = sample_bar(105.0);
        assert!((bar.return_since(100.0) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn return_since_loss() {
        let bar = sample_bar(90.0);
        assert!((bar.return_since(100.0) - (-0.10)).abs() < 1e-12);
    }

    #[test]
    fn return_since_zero_previous_is_flat() {
        let bar = sample_bar(90.0);
        assert_eq!(bar.return_since(0.0), 0.0);
        assert_eq!(bar.return_since(f64::NAN), 0.0);
    }
}
